//! Lendaro Risk - Value banding and the per-booking funding snapshot
//!
//! Two concerns live here:
//! - the static risk policy table mapping estimated asset value to a
//!   bucket, franchise and hold amounts (pure, stateless);
//! - the snapshot store freezing a booking's funding posture once, at
//!   confirmation time, for every later claim to settle against.

pub mod policy;
pub mod snapshot;

pub use policy::{
    display_amounts, resolve, DisplayAmounts, RiskPolicy, HOLD_ROLLOVER_MULTIPLIER,
    ROLLOVER_FRANCHISE_MULTIPLIER,
};
pub use snapshot::{InMemorySnapshotStore, SnapshotParams, SnapshotStore};
