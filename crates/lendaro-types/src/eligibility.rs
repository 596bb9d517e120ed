//! Eligibility and waterfall result types

use crate::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-level solvency classification from fixed ratio thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolvencyStatus {
    Healthy,
    Warning,
    Critical,
}

impl fmt::Display for SolvencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolvencyStatus::Healthy => "healthy",
            SolvencyStatus::Warning => "warning",
            SolvencyStatus::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot-in-time advisory on guarantee fund participation
///
/// Never persisted and never cached across claim processing: re-derived on
/// every assessment. `reasons` lists every failed check, not just the
/// first, so a rejection can be explained completely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub eligible: bool,
    pub reasons: Vec<String>,
    pub solvency_ratio: f64,
    pub solvency_status: SolvencyStatus,
    /// Franchise share retained by the owner, in basis points
    pub franchise_bps: u32,
    /// Advisory coverage ceiling; the fund stage logs when it is exceeded
    /// but is not hard-capped by it
    pub max_coverage: Amount,
    pub monthly_payout_used: Amount,
    pub monthly_payout_cap: Amount,
    pub user_event_count: u32,
    pub user_event_limit: u32,
    /// Liquidity balance observed at evaluation time
    pub fund_balance: Amount,
}

/// Deterministic outcome of the funding cascade
///
/// Invariant: `hold_captured + wallet_debited + extra_charged + fund_paid
/// + remaining_uncovered == claim_amount`, minor-unit exact. Whenever the
/// fund stage executes, `remaining_uncovered` is zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterfallBreakdown {
    pub claim_amount: Amount,
    pub hold_captured: Amount,
    pub wallet_debited: Amount,
    pub extra_charged: Amount,
    pub fund_paid: Amount,
    pub remaining_uncovered: Amount,
}

impl WaterfallBreakdown {
    /// Total recovered across the four funding sources
    pub fn recovered_total(&self) -> Amount {
        self.hold_captured + self.wallet_debited + self.extra_charged + self.fund_paid
    }

    /// Check the conservation invariant
    pub fn is_balanced(&self) -> bool {
        self.recovered_total().0 + self.remaining_uncovered.0 == self.claim_amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakdown_balance_check() {
        let breakdown = WaterfallBreakdown {
            claim_amount: Amount::cents(80_000),
            hold_captured: Amount::cents(20_000),
            wallet_debited: Amount::ZERO,
            extra_charged: Amount::ZERO,
            fund_paid: Amount::cents(60_000),
            remaining_uncovered: Amount::ZERO,
        };
        assert!(breakdown.is_balanced());
        assert_eq!(breakdown.recovered_total(), Amount::cents(80_000));

        let unbalanced = WaterfallBreakdown {
            fund_paid: Amount::cents(50_000),
            ..breakdown
        };
        assert!(!unbalanced.is_balanced());
    }
}
