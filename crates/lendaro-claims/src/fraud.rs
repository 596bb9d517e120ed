//! Anti-fraud gating for claim creation
//!
//! Verdicts separate blocking findings from warnings: a block means the
//! claim is never persisted, a warning rides along on the claim for
//! manual review. The two are never conflated. Validator infrastructure
//! failures are handled by the caller (fail-open), not here.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use lendaro_types::{Amount, BookingId, FraudWarning, Result, UserId};

use crate::store::ClaimStore;

/// Verdict from anti-fraud validation
#[derive(Debug, Clone, Default)]
pub struct FraudVerdict {
    /// Rules that hard-block claim creation
    pub blocks: Vec<String>,
    /// Non-blocking findings attached to the claim
    pub warnings: Vec<FraudWarning>,
}

impl FraudVerdict {
    pub fn is_blocked(&self) -> bool {
        !self.blocks.is_empty()
    }
}

/// Anti-fraud validation seam
#[async_trait]
pub trait FraudValidator: Send + Sync {
    async fn validate(
        &self,
        booking_id: &BookingId,
        reporter: &UserId,
        total: Amount,
    ) -> Result<FraudVerdict>;
}

/// Booking metadata needed by the duration rule
#[async_trait]
pub trait BookingInfoSource: Send + Sync {
    /// Rental duration in hours, or `None` when the booking is unknown
    async fn rental_duration_hours(&self, booking_id: &BookingId) -> Option<i64>;
}

/// Thresholds for the rule-based validator
#[derive(Debug, Clone)]
pub struct FraudConfig {
    /// Bookings shorter than this draw a warning
    pub short_booking_hours: i64,
    /// Window for the claim-velocity rule
    pub velocity_window_days: i64,
    /// Claims by the same reporter within the window that hard-block
    pub velocity_limit: u32,
    /// Totals above this draw a warning
    pub high_amount: Amount,
    /// Round-amount rule: totals at or above this and divisible by the
    /// modulus draw a warning
    pub round_amount_min: Amount,
    pub round_modulus: u64,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            short_booking_hours: 24,
            velocity_window_days: 30,
            velocity_limit: 3,
            high_amount: Amount::cents(500_000),
            round_amount_min: Amount::cents(100_000),
            round_modulus: 10_000,
        }
    }
}

/// Rule-based anti-fraud validator
///
/// Rules: short-duration booking (warn), claim velocity (block),
/// unusually high amount (warn), suspiciously round amount (warn).
pub struct RuleBasedFraudValidator {
    claims: Arc<dyn ClaimStore>,
    bookings: Arc<dyn BookingInfoSource>,
    config: FraudConfig,
}

impl RuleBasedFraudValidator {
    pub fn new(
        claims: Arc<dyn ClaimStore>,
        bookings: Arc<dyn BookingInfoSource>,
        config: FraudConfig,
    ) -> Self {
        Self {
            claims,
            bookings,
            config,
        }
    }
}

#[async_trait]
impl FraudValidator for RuleBasedFraudValidator {
    async fn validate(
        &self,
        booking_id: &BookingId,
        reporter: &UserId,
        total: Amount,
    ) -> Result<FraudVerdict> {
        let mut verdict = FraudVerdict::default();

        if let Some(hours) = self.bookings.rental_duration_hours(booking_id).await {
            if hours < self.config.short_booking_hours {
                verdict.warnings.push(FraudWarning {
                    rule: "short_booking".to_string(),
                    detail: format!("booking lasted only {hours}h"),
                });
            }
        }

        let window_start = Utc::now() - Duration::days(self.config.velocity_window_days);
        let recent = self
            .claims
            .claims_created_since(reporter, window_start)
            .await;
        if recent >= self.config.velocity_limit {
            verdict.blocks.push(format!(
                "claim_velocity: {recent} claims in the last {} days",
                self.config.velocity_window_days
            ));
        }

        if total > self.config.high_amount {
            verdict.warnings.push(FraudWarning {
                rule: "high_amount".to_string(),
                detail: format!("claim total {total} exceeds {}", self.config.high_amount),
            });
        }

        if total >= self.config.round_amount_min && total.0 % self.config.round_modulus == 0 {
            verdict.warnings.push(FraudWarning {
                rule: "round_amount".to_string(),
                detail: format!("claim total {total} is suspiciously round"),
            });
        }

        Ok(verdict)
    }
}

/// Static booking-duration table for tests and the demo service
#[derive(Default)]
pub struct StaticBookingInfo {
    durations: tokio::sync::RwLock<std::collections::HashMap<BookingId, i64>>,
}

impl StaticBookingInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_duration_hours(&self, booking_id: BookingId, hours: i64) {
        self.durations.write().await.insert(booking_id, hours);
    }
}

#[async_trait]
impl BookingInfoSource for StaticBookingInfo {
    async fn rental_duration_hours(&self, booking_id: &BookingId) -> Option<i64> {
        self.durations.read().await.get(booking_id).copied()
    }
}
