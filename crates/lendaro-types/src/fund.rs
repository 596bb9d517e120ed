//! Guarantee fund movement types
//!
//! Movements are append-only: never updated, never deleted. Balances are
//! always derived from the movement history so there is no cached total to
//! drift out of sync.

use crate::{Amount, BookingId, ClaimId, CountryCode, MovementId, RiskBucket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Guarantee fund sub-account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubAccount {
    /// Pays claims; must never go negative
    Liquidity,
    /// Long-term capital base
    Capitalization,
    /// Distributable surplus
    Profitability,
}

impl SubAccount {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubAccount::Liquidity => "liquidity",
            SubAccount::Capitalization => "capitalization",
            SubAccount::Profitability => "profitability",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "liquidity" => Some(SubAccount::Liquidity),
            "capitalization" => Some(SubAccount::Capitalization),
            "profitability" => Some(SubAccount::Profitability),
            _ => None,
        }
    }
}

impl fmt::Display for SubAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a movement increases or decreases its sub-account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Credit,
    Debit,
}

/// Business reason for a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementDirection {
    /// Booking-fee contribution into the fund
    Contribution,
    /// Claim or admin payout out of the fund
    Payout,
    /// Amount recovered after a settled loss
    Recovery,
    /// Sub-account to sub-account transfer leg
    Transfer,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::Contribution => "contribution",
            MovementDirection::Payout => "payout",
            MovementDirection::Recovery => "recovery",
            MovementDirection::Transfer => "transfer",
        }
    }
}

/// Append-only guarantee fund ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundMovement {
    pub id: MovementId,
    pub sub_account: SubAccount,
    pub entry: EntryKind,
    pub direction: MovementDirection,
    pub amount: Amount,
    pub country: CountryCode,
    pub bucket: RiskBucket,
    pub booking_id: Option<BookingId>,
    pub claim_id: Option<ClaimId>,
    /// FX rate snapshot at write time, when one applies
    pub fx_rate: Option<f64>,
    /// Solvency ratio at write time, for audit
    pub solvency_ratio: Option<f64>,
    /// Human-readable reason; mandatory for admin-initiated movements
    pub reason: String,
    /// Admin who authorized the movement, when privileged
    pub admin_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FundMovement {
    /// Signed contribution of this movement to its sub-account balance
    pub fn signed_amount(&self) -> i128 {
        match self.entry {
            EntryKind::Credit => self.amount.0 as i128,
            EntryKind::Debit => -(self.amount.0 as i128),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_amount_follows_entry_kind() {
        let mut movement = FundMovement {
            id: MovementId::new(),
            sub_account: SubAccount::Liquidity,
            entry: EntryKind::Credit,
            direction: MovementDirection::Contribution,
            amount: Amount::cents(5_000),
            country: CountryCode::new("FR"),
            bucket: RiskBucket::Default,
            booking_id: None,
            claim_id: None,
            fx_rate: None,
            solvency_ratio: None,
            reason: "booking fee".to_string(),
            admin_id: None,
            created_at: Utc::now(),
        };
        assert_eq!(movement.signed_amount(), 5_000);

        movement.entry = EntryKind::Debit;
        assert_eq!(movement.signed_amount(), -5_000);
    }
}
