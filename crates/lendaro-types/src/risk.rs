//! Risk bucket and funding-posture snapshot types

use crate::{Amount, BookingId, CountryCode, Currency, FxRate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk bucket derived from estimated asset value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskBucket {
    Economy,
    Default,
    Premium,
    Luxury,
}

impl RiskBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBucket::Economy => "economy",
            RiskBucket::Default => "default",
            RiskBucket::Premium => "premium",
            RiskBucket::Luxury => "luxury",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "economy" => Some(RiskBucket::Economy),
            "default" => Some(RiskBucket::Default),
            "premium" => Some(RiskBucket::Premium),
            "luxury" => Some(RiskBucket::Luxury),
            _ => None,
        }
    }
}

impl fmt::Display for RiskBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Funding posture of a booking, frozen at confirmation time
///
/// Exactly one snapshot exists per booking and it never changes: every
/// claim raised against the booking settles on the same posture, FX rate
/// included. Absence of a snapshot is a valid state (the booking was never
/// funded) and callers must handle it explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub booking_id: BookingId,
    pub country: CountryCode,
    pub bucket: RiskBucket,
    pub currency: Currency,
    /// FX rate at booking time, opaque to the engine
    pub fx_rate: FxRate,
    /// Pre-authorized hold estimated at booking time
    pub hold_amount: Amount,
    /// Wallet security credit available when there is no card hold
    pub wallet_security_amount: Amount,
    /// Deductible below which the owner bears losses without fund support
    pub franchise_amount: Amount,
    pub has_card_hold: bool,
    pub has_wallet_security: bool,
    /// Gateway reference for the pre-authorization, when one exists
    pub authorization_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}
