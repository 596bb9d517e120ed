//! Risk policy resolution
//!
//! A pure function of estimated asset value over a static, ordered,
//! non-overlapping band table. No state, no I/O; the only failure mode is
//! a negative input value.

use lendaro_types::{Amount, GuaranteeMultipliers, LendaroError, Result, RiskBucket};
use serde::{Deserialize, Serialize};

/// Fixed multiplier applied to the standard franchise on rollover bookings
pub const ROLLOVER_FRANCHISE_MULTIPLIER: u64 = 2;

/// Fixed share of the hold retained on rollover bookings
pub const HOLD_ROLLOVER_MULTIPLIER: f64 = 0.35;

/// Value threshold (minor units) between the two security-credit tiers
pub const SECURITY_CREDIT_THRESHOLD: Amount = Amount(100_000);

/// Security credit below the threshold
pub const SECURITY_CREDIT_LOW: Amount = Amount(5_000);

/// Security credit at or above the threshold
pub const SECURITY_CREDIT_HIGH: Amount = Amount(15_000);

/// One row of the static value-band table
#[derive(Debug, Clone, Copy)]
struct ValueBand {
    bucket: RiskBucket,
    /// Inclusive lower bound, minor units
    min_value: u64,
    /// Exclusive upper bound; `None` for the open-ended top band
    max_value: Option<u64>,
    standard_franchise: Amount,
    min_hold: Amount,
}

/// Ordered, non-overlapping. The last band is open-ended upward.
const BANDS: [ValueBand; 4] = [
    ValueBand {
        bucket: RiskBucket::Economy,
        min_value: 0,
        max_value: Some(30_000),
        standard_franchise: Amount(5_000),
        min_hold: Amount(3_000),
    },
    ValueBand {
        bucket: RiskBucket::Default,
        min_value: 30_000,
        max_value: Some(150_000),
        standard_franchise: Amount(15_000),
        min_hold: Amount(8_000),
    },
    ValueBand {
        bucket: RiskBucket::Premium,
        min_value: 150_000,
        max_value: Some(500_000),
        standard_franchise: Amount(30_000),
        min_hold: Amount(20_000),
    },
    ValueBand {
        bucket: RiskBucket::Luxury,
        min_value: 500_000,
        max_value: None,
        standard_franchise: Amount(60_000),
        min_hold: Amount(40_000),
    },
];

/// Resolved risk policy for an asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPolicy {
    pub bucket: RiskBucket,
    /// Inclusive lower bound of the matched band, minor units
    pub band_min: u64,
    /// Exclusive upper bound; `None` for the open-ended top band
    pub band_max: Option<u64>,
    pub standard_franchise: Amount,
    pub min_hold: Amount,
    pub security_credit: Amount,
}

impl RiskPolicy {
    /// Franchise applied on rollover bookings (fixed 2x)
    pub fn rollover_franchise(&self) -> Result<Amount> {
        self.standard_franchise
            .checked_add(self.standard_franchise)
            .map_err(|_| LendaroError::AmountOverflow)
    }

    /// Hold floor retained on rollover bookings (fixed 0.35x, rounded)
    pub fn rollover_hold(&self) -> Amount {
        Amount(((self.min_hold.0 as f64) * HOLD_ROLLOVER_MULTIPLIER).round() as u64)
    }
}

/// Franchise and hold amounts scaled for display by bonus-malus multipliers
///
/// Presentation only: settlement always uses the snapshot amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayAmounts {
    pub franchise: Amount,
    pub hold: Amount,
}

/// Map an estimated asset value to its risk policy
///
/// Picks the first band containing the value; values beyond every bound
/// fall into the highest band. Negative values are rejected.
pub fn resolve(estimated_value: i64) -> Result<RiskPolicy> {
    if estimated_value < 0 {
        return Err(LendaroError::validation(
            "estimated_value",
            "asset value cannot be negative",
        ));
    }
    let value = estimated_value as u64;

    let band = BANDS
        .iter()
        .find(|b| value >= b.min_value && b.max_value.map_or(true, |max| value < max))
        .unwrap_or(&BANDS[BANDS.len() - 1]);

    let security_credit = if Amount(value) < SECURITY_CREDIT_THRESHOLD {
        SECURITY_CREDIT_LOW
    } else {
        SECURITY_CREDIT_HIGH
    };

    Ok(RiskPolicy {
        bucket: band.bucket,
        band_min: band.min_value,
        band_max: band.max_value,
        standard_franchise: band.standard_franchise,
        min_hold: band.min_hold,
        security_credit,
    })
}

/// Apply bonus-malus multipliers to a policy for display
pub fn display_amounts(policy: &RiskPolicy, multipliers: GuaranteeMultipliers) -> DisplayAmounts {
    let scale = |amount: Amount, factor: f64| -> Amount {
        Amount(((amount.0 as f64) * factor).round().max(0.0) as u64)
    };
    DisplayAmounts {
        franchise: scale(policy.standard_franchise, multipliers.fee_multiplier),
        hold: scale(policy.min_hold, multipliers.guarantee_multiplier),
    }
}
