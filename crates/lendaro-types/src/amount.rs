//! Minor-unit amount type
//!
//! All money in the settlement engine is integer minor units (cents).
//! The waterfall conservation property is checked at cent resolution, so
//! no floating point is allowed anywhere in amount arithmetic. FX is the
//! one boundary where a float enters: a booking-time rate snapshot applied
//! once, rounded back to minor units.

use crate::{LendaroError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// Settlement currency of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Eur,
    Usd,
    Gbp,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A non-negative amount in minor units (cents)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Create an amount from minor units
    pub fn cents(cents: u64) -> Self {
        Self(cents)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(LendaroError::AmountOverflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(LendaroError::AmountUnderflow)
    }

    /// Subtraction clamped at zero
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Addition clamped at `u64::MAX`
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Multiply by basis points (100 = 1%), rounding down
    pub fn basis_points(self, bps: u32) -> Result<Self> {
        let value = (self.0 as u128)
            .checked_mul(bps as u128)
            .ok_or(LendaroError::AmountOverflow)?
            / 10_000;
        u64::try_from(value)
            .map(Self)
            .map_err(|_| LendaroError::AmountOverflow)
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        self.checked_add(other).expect("amount addition overflow")
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        self.checked_sub(other)
            .expect("amount subtraction underflow")
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// FX rate snapshot taken at booking time
///
/// Opaque input to the engine: nobody here derives rates, they are stamped
/// onto the risk snapshot and onto every fund movement for audit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FxRate(pub f64);

impl FxRate {
    /// Identity rate (claim currency == fund currency)
    pub fn unity() -> Self {
        Self(1.0)
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.0 > 0.0
    }

    /// Convert an amount into the snapshot basis, rounding to minor units
    pub fn convert(&self, amount: Amount) -> Result<Amount> {
        if !self.is_valid() {
            return Err(LendaroError::validation("fx_rate", "rate must be positive and finite"));
        }
        let converted = (amount.0 as f64 * self.0).round();
        if converted < 0.0 || converted > u64::MAX as f64 {
            return Err(LendaroError::AmountOverflow);
        }
        Ok(Amount(converted as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_arithmetic() {
        let a = Amount::cents(1_000);
        let b = Amount::cents(400);
        assert_eq!(a.checked_add(b).unwrap(), Amount::cents(1_400));
        assert_eq!(a.checked_sub(b).unwrap(), Amount::cents(600));
        assert!(b.checked_sub(a).is_err());
        assert_eq!(b.saturating_sub(a), Amount::ZERO);
    }

    #[test]
    fn basis_points_round_down() {
        let a = Amount::cents(10_001);
        // 10% of 100.01 = 10.001 -> 10.00
        assert_eq!(a.basis_points(1_000).unwrap(), Amount::cents(1_000));
    }

    #[test]
    fn fx_conversion_rounds_to_minor_units() {
        let rate = FxRate(1.1);
        assert_eq!(rate.convert(Amount::cents(1_000)).unwrap(), Amount::cents(1_100));
        let rate = FxRate(0.333);
        assert_eq!(rate.convert(Amount::cents(100)).unwrap(), Amount::cents(33));
    }

    #[test]
    fn invalid_fx_rate_rejected() {
        assert!(FxRate(0.0).convert(Amount::cents(100)).is_err());
        assert!(FxRate(f64::NAN).convert(Amount::cents(100)).is_err());
    }

    #[test]
    fn display_formats_cents() {
        assert_eq!(Amount::cents(12_345).to_string(), "123.45");
        assert_eq!(Amount::cents(5).to_string(), "0.05");
    }
}
