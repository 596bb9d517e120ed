//! Lendaro Types - Canonical domain types for the claim settlement engine
//!
//! This crate contains all foundational types for Lendaro's guarantee-fund
//! waterfall with zero dependencies on other lendaro crates:
//!
//! - Identity types (BookingId, ClaimId, UserId, AdminId, MovementId)
//! - Minor-unit amounts and FX rate snapshots
//! - Risk buckets and the immutable per-booking RiskSnapshot
//! - Claim, damage and lifecycle status types
//! - Guarantee fund movement rows
//! - Eligibility and waterfall breakdown results
//! - Collaborator boundary types (gateway, wallet, inspections, classifier)
//!
//! # Invariants carried by these types
//!
//! 1. All money is integer minor units; conservation is cent-exact
//! 2. A claim total is recomputed from its items, never trusted as input
//! 3. Fund movements are append-only and balances are always derived
//! 4. Failure is explicit: one error taxonomy, matched exhaustively

pub mod amount;
pub mod claim;
pub mod eligibility;
pub mod error;
pub mod external;
pub mod fund;
pub mod identity;
pub mod risk;

pub use amount::*;
pub use claim::*;
pub use eligibility::*;
pub use error::*;
pub use external::*;
pub use fund::*;
pub use identity::*;
pub use risk::*;

/// Version of the Lendaro types schema
pub const TYPES_VERSION: &str = "0.1.0";
