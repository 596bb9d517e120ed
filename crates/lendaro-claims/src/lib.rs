//! Lendaro Claims - Claim lifecycle and the settlement waterfall
//!
//! This crate ties the engine together: claim creation behind its gates
//! (inspections, snapshot, anti-fraud), the review state machine, the
//! optimistic claim lock, and the four-stage funding cascade that makes
//! the owner whole. External integrations (gateway, wallet, inspections,
//! classifier) sit behind traits in [`external`]; in-memory
//! implementations back the service binary and the tests.

pub mod external;
pub mod fraud;
pub mod manager;
pub mod store;
pub mod waterfall;

pub use external::{
    DamageClassifier, InMemoryWallet, InspectionValidator, MultiplierSource,
    NeutralMultiplierSource, PaymentGateway, SimulatedGateway, StaticClassifier,
    StaticInspectionValidator, WalletLedger,
};
pub use fraud::{
    BookingInfoSource, FraudConfig, FraudValidator, FraudVerdict, RuleBasedFraudValidator,
    StaticBookingInfo,
};
pub use manager::{ClaimManager, ManagerConfig, ProcessOutcome, SimulationResult};
pub use store::{ClaimStore, InMemoryClaimStore};
pub use waterfall::{SettlementExecutor, WaterfallExecutor};
