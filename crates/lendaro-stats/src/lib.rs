//! Lendaro Stats - Loss statistics and solvency for the guarantee fund
//!
//! Computes, per country/bucket segment:
//! - PEM: trailing-window expected monthly loss from settled claim
//!   movements
//! - RC: solvency ratio, segment liquidity balance over a target balance
//!   sized as a policy multiple of PEM
//! - contribution-rate adjustments derived from the current ratio
//!
//! Everything is recomputed from the movement log on every call; there is
//! no cached aggregate to drift.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use lendaro_fund::FundLedger;
use lendaro_types::{
    AdminId, Amount, CountryCode, LendaroError, MovementDirection, Result, RiskBucket,
    SolvencyStatus,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

/// Tuning for solvency and contribution-rate policy
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Trailing window for loss aggregation
    pub window_days: i64,
    /// Target balance as a multiple of expected monthly loss
    pub target_months: f64,
    /// Ratio at or above which the segment is healthy
    pub healthy_ratio: f64,
    /// Ratio at or above which the segment is only in warning
    pub warning_ratio: f64,
    /// Ratio above which, sustained, the rate may be lowered
    pub high_ratio: f64,
    /// Contribution rate defaults and bounds, in basis points
    pub base_rate_bps: u32,
    pub rate_step_bps: u32,
    pub rate_floor_bps: u32,
    pub rate_ceiling_bps: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            target_months: 3.0,
            healthy_ratio: 1.0,
            warning_ratio: 0.5,
            high_ratio: 1.5,
            base_rate_bps: 300,
            rate_step_bps: 50,
            rate_floor_bps: 100,
            rate_ceiling_bps: 800,
        }
    }
}

/// Trailing-window loss aggregate for one segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedLoss {
    pub country: CountryCode,
    pub bucket: RiskBucket,
    pub window_days: i64,
    pub event_count: u64,
    pub total_paid: Amount,
    pub total_recovered: Amount,
    pub average_event_cost: Amount,
    /// Net loss scaled to a 30-day month
    pub expected_monthly_loss: Amount,
}

/// Solvency snapshot for one segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolvencyReport {
    pub country: CountryCode,
    pub bucket: RiskBucket,
    pub expected_monthly_loss: Amount,
    pub current_balance: Amount,
    pub target_balance: Amount,
    pub ratio: f64,
    pub event_count: u64,
    pub status: SolvencyStatus,
}

/// Which way a contribution-rate adjustment moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateDirection {
    Raised,
    Lowered,
    Unchanged,
}

/// Outcome of a contribution-rate adjustment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentResult {
    pub country: CountryCode,
    pub bucket: RiskBucket,
    pub old_rate_bps: u32,
    pub new_rate_bps: u32,
    pub ratio: f64,
    pub direction: RateDirection,
}

/// Loss statistics engine over the guarantee fund movement log
#[derive(Clone)]
pub struct LossStatsEngine {
    ledger: Arc<FundLedger>,
    rates: Arc<RwLock<HashMap<(CountryCode, RiskBucket), u32>>>,
    admins: Arc<HashSet<AdminId>>,
    config: StatsConfig,
}

impl LossStatsEngine {
    pub fn new(
        ledger: Arc<FundLedger>,
        admins: impl IntoIterator<Item = AdminId>,
        config: StatsConfig,
    ) -> Self {
        Self {
            ledger,
            rates: Arc::new(RwLock::new(HashMap::new())),
            admins: Arc::new(admins.into_iter().collect()),
            config,
        }
    }

    /// Trailing expected monthly loss for a segment
    ///
    /// Settled events are payout movements carrying a claim reference;
    /// admin direct payouts are fund management, not losses, and are
    /// excluded. Net loss is paid minus recovered, scaled to 30 days.
    pub async fn expected_monthly_loss(
        &self,
        country: &CountryCode,
        bucket: RiskBucket,
        window_days: i64,
    ) -> ExpectedLoss {
        let since = Utc::now() - Duration::days(window_days);
        let movements = self
            .ledger
            .segment_movements_since(country, bucket, since)
            .await;

        let mut total_paid: u128 = 0;
        let mut total_recovered: u128 = 0;
        let mut claim_ids = HashSet::new();
        for movement in &movements {
            match movement.direction {
                MovementDirection::Payout => {
                    if let Some(claim_id) = &movement.claim_id {
                        total_paid += movement.amount.0 as u128;
                        claim_ids.insert(claim_id.clone());
                    }
                }
                MovementDirection::Recovery => {
                    total_recovered += movement.amount.0 as u128;
                }
                MovementDirection::Contribution | MovementDirection::Transfer => {}
            }
        }

        let event_count = claim_ids.len() as u64;
        let average_event_cost = if event_count == 0 {
            Amount::ZERO
        } else {
            Amount((total_paid / event_count as u128) as u64)
        };
        let net_loss = total_paid.saturating_sub(total_recovered);
        let expected_monthly_loss = if window_days <= 0 {
            Amount::ZERO
        } else {
            Amount((net_loss * 30 / window_days as u128) as u64)
        };

        ExpectedLoss {
            country: country.clone(),
            bucket,
            window_days,
            event_count,
            total_paid: Amount(total_paid as u64),
            total_recovered: Amount(total_recovered as u64),
            average_event_cost,
            expected_monthly_loss,
        }
    }

    /// Solvency ratio for a segment over the configured window
    pub async fn solvency_ratio(
        &self,
        country: &CountryCode,
        bucket: RiskBucket,
    ) -> SolvencyReport {
        self.solvency_with_window(country, bucket, self.config.window_days)
            .await
    }

    async fn solvency_with_window(
        &self,
        country: &CountryCode,
        bucket: RiskBucket,
        window_days: i64,
    ) -> SolvencyReport {
        let pem = self
            .expected_monthly_loss(country, bucket, window_days)
            .await;
        let current_balance = self.ledger.segment_balance(country, bucket).await;
        let target_balance = Amount(
            ((pem.expected_monthly_loss.0 as f64) * self.config.target_months).round() as u64,
        );

        // No loss history in the window means there is nothing to fund
        // against; the segment is treated as fully solvent.
        let ratio = if target_balance.is_zero() {
            self.config.healthy_ratio
        } else {
            current_balance.0 as f64 / target_balance.0 as f64
        };

        let status = if ratio >= self.config.healthy_ratio {
            SolvencyStatus::Healthy
        } else if ratio >= self.config.warning_ratio {
            SolvencyStatus::Warning
        } else {
            SolvencyStatus::Critical
        };

        SolvencyReport {
            country: country.clone(),
            bucket,
            expected_monthly_loss: pem.expected_monthly_loss,
            current_balance,
            target_balance,
            ratio,
            event_count: pem.event_count,
            status,
        }
    }

    /// Current contribution rate for a segment, in basis points
    pub async fn current_rate(&self, country: &CountryCode, bucket: RiskBucket) -> u32 {
        self.rates
            .read()
            .await
            .get(&(country.clone(), bucket))
            .copied()
            .unwrap_or(self.config.base_rate_bps)
    }

    /// Adjust the stored contribution rate from the current solvency state
    ///
    /// The new rate is a function of the ratio tier alone, so repeated
    /// calls at unchanged state converge instead of accumulating drift:
    /// critical and warning tiers raise the rate above base, a ratio that
    /// stays high across both the standard and the doubled window lowers
    /// it below base, and a plain healthy segment sits at base. Restricted
    /// to fund operators.
    pub async fn adjust_contribution_rate(
        &self,
        country: &CountryCode,
        bucket: RiskBucket,
        admin: &AdminId,
    ) -> Result<AdjustmentResult> {
        if !self.admins.contains(admin) {
            return Err(LendaroError::unauthorized(format!(
                "{} may not adjust contribution rates",
                admin
            )));
        }

        let report = self.solvency_ratio(country, bucket).await;
        let sustained_high = if report.ratio >= self.config.high_ratio {
            let long = self
                .solvency_with_window(country, bucket, self.config.window_days * 2)
                .await;
            long.ratio >= self.config.high_ratio
        } else {
            false
        };

        let target_bps = match report.status {
            SolvencyStatus::Critical => self.config.base_rate_bps + 2 * self.config.rate_step_bps,
            SolvencyStatus::Warning => self.config.base_rate_bps + self.config.rate_step_bps,
            SolvencyStatus::Healthy if sustained_high => self
                .config
                .base_rate_bps
                .saturating_sub(self.config.rate_step_bps),
            SolvencyStatus::Healthy => self.config.base_rate_bps,
        };
        let new_rate_bps = target_bps.clamp(self.config.rate_floor_bps, self.config.rate_ceiling_bps);

        let mut rates = self.rates.write().await;
        let old_rate_bps = rates
            .get(&(country.clone(), bucket))
            .copied()
            .unwrap_or(self.config.base_rate_bps);
        rates.insert((country.clone(), bucket), new_rate_bps);

        let direction = match new_rate_bps.cmp(&old_rate_bps) {
            std::cmp::Ordering::Greater => RateDirection::Raised,
            std::cmp::Ordering::Less => RateDirection::Lowered,
            std::cmp::Ordering::Equal => RateDirection::Unchanged,
        };
        info!(
            country = %country,
            bucket = %bucket,
            old = old_rate_bps,
            new = new_rate_bps,
            ratio = report.ratio,
            "contribution rate adjusted"
        );

        Ok(AdjustmentResult {
            country: country.clone(),
            bucket,
            old_rate_bps,
            new_rate_bps,
            ratio: report.ratio,
            direction,
        })
    }
}
