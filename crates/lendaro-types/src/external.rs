//! Typed results exchanged with external collaborators
//!
//! Duck-typed RPC payloads from integrations are validated once at the
//! boundary into these structs and never re-checked downstream.

use crate::{Amount, DamageType, Severity};
use serde::{Deserialize, Serialize};

/// Inspection stage of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectionStage {
    CheckIn,
    CheckOut,
}

impl InspectionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionStage::CheckIn => "check_in",
            InspectionStage::CheckOut => "check_out",
        }
    }
}

/// Verdict from the inspection validator, gating claim creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionReport {
    pub valid: bool,
    pub missing_stages: Vec<InspectionStage>,
}

/// Automated damage proposal from the image classifier, never authoritative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedDamage {
    pub damage_type: DamageType,
    pub severity: Severity,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
    pub estimated_cost: Amount,
}

/// Outcome of capturing a pre-authorization at the payment gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResult {
    pub ok: bool,
    pub captured_amount: Amount,
    pub error: Option<String>,
}

/// Outcome of a wallet security-credit debit
///
/// `debited_amount` may be lower than requested on insufficient funds;
/// the waterfall accepts whatever was actually debited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDebitResult {
    pub success: bool,
    pub debited_amount: Amount,
    pub error: Option<String>,
}

/// Read-only bonus-malus multipliers per user
///
/// Consumed for franchise/hold display amounts; this engine never writes
/// back to the classification state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GuaranteeMultipliers {
    pub fee_multiplier: f64,
    pub guarantee_multiplier: f64,
}

impl Default for GuaranteeMultipliers {
    fn default() -> Self {
        Self {
            fee_multiplier: 1.0,
            guarantee_multiplier: 1.0,
        }
    }
}
