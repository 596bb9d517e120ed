//! Lendaro Eligibility - May the guarantee fund participate in a claim?
//!
//! The assessor combines the booking's risk snapshot, the segment's
//! solvency ratio, the reporter's rolling event count and the segment's
//! monthly payout cap into a single advisory verdict. It performs no
//! writes and is re-derived on every call: callers (including the
//! simulator) may invoke it repeatedly without side effects, and the
//! result is never cached across claim processing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use lendaro_fund::FundLedger;
use lendaro_risk::SnapshotStore;
use lendaro_stats::LossStatsEngine;
use lendaro_types::{
    Amount, BookingId, EligibilityResult, MovementDirection, Result, SolvencyStatus, UserId,
};
use tracing::debug;

/// Read-only view of a user's settled claim history
///
/// Implemented by the claim store; kept as a seam so the assessor stays
/// independent of claim persistence.
#[async_trait]
pub trait ClaimHistory: Send + Sync {
    /// Number of paid claims reported by `user` since `since`
    async fn paid_claim_count(&self, user: &UserId, since: DateTime<Utc>) -> u32;
}

/// Coverage policy per solvency tier and the global limit knobs
#[derive(Debug, Clone)]
pub struct EligibilityConfig {
    /// Ratio below which fund coverage is suspended entirely
    pub hard_floor_ratio: f64,
    /// Franchise share per tier, basis points
    pub franchise_bps_healthy: u32,
    pub franchise_bps_warning: u32,
    pub franchise_bps_critical: u32,
    /// Advisory coverage ceiling per tier
    pub max_coverage_healthy: Amount,
    pub max_coverage_warning: Amount,
    pub max_coverage_critical: Amount,
    /// Paid claims allowed per user over the trailing quarter
    pub user_event_limit: u32,
    /// Aggregate payout cap per segment and calendar month
    pub monthly_payout_cap: Amount,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            hard_floor_ratio: 0.25,
            franchise_bps_healthy: 1_000,
            franchise_bps_warning: 2_000,
            franchise_bps_critical: 3_000,
            max_coverage_healthy: Amount::cents(500_000),
            max_coverage_warning: Amount::cents(200_000),
            max_coverage_critical: Amount::cents(75_000),
            user_event_limit: 5,
            monthly_payout_cap: Amount::cents(2_000_000),
        }
    }
}

/// The eligibility assessor
#[derive(Clone)]
pub struct EligibilityAssessor {
    snapshots: Arc<dyn SnapshotStore>,
    stats: Arc<LossStatsEngine>,
    ledger: Arc<FundLedger>,
    history: Arc<dyn ClaimHistory>,
    config: EligibilityConfig,
}

impl EligibilityAssessor {
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        stats: Arc<LossStatsEngine>,
        ledger: Arc<FundLedger>,
        history: Arc<dyn ClaimHistory>,
        config: EligibilityConfig,
    ) -> Self {
        Self {
            snapshots,
            stats,
            ledger,
            history,
            config,
        }
    }

    /// Assess fund participation for a claim amount on a booking
    ///
    /// `reporter` is `None` when called from the simulator, which skips
    /// the per-user check. Every failed check lands in `reasons`, not just
    /// the first, so a rejection can be explained completely.
    pub async fn assess(
        &self,
        booking_id: &BookingId,
        reporter: Option<&UserId>,
        claim_amount: Amount,
    ) -> Result<EligibilityResult> {
        let snapshot = match self.snapshots.get(booking_id).await {
            Some(snapshot) => snapshot,
            None => {
                return Ok(EligibilityResult {
                    eligible: false,
                    reasons: vec![format!("no snapshot for booking {}", booking_id)],
                    solvency_ratio: 0.0,
                    solvency_status: SolvencyStatus::Critical,
                    franchise_bps: 0,
                    max_coverage: Amount::ZERO,
                    monthly_payout_used: Amount::ZERO,
                    monthly_payout_cap: self.config.monthly_payout_cap,
                    user_event_count: 0,
                    user_event_limit: self.config.user_event_limit,
                    fund_balance: Amount::ZERO,
                });
            }
        };

        let mut reasons = Vec::new();

        let report = self
            .stats
            .solvency_ratio(&snapshot.country, snapshot.bucket)
            .await;

        let below_floor = report.ratio < self.config.hard_floor_ratio;
        let (franchise_bps, max_coverage) = if below_floor {
            reasons.push(format!(
                "solvency ratio {:.2} below hard floor {:.2}, fund coverage suspended",
                report.ratio, self.config.hard_floor_ratio
            ));
            (0, Amount::ZERO)
        } else {
            match report.status {
                SolvencyStatus::Healthy => (
                    self.config.franchise_bps_healthy,
                    self.config.max_coverage_healthy,
                ),
                SolvencyStatus::Warning => (
                    self.config.franchise_bps_warning,
                    self.config.max_coverage_warning,
                ),
                SolvencyStatus::Critical => (
                    self.config.franchise_bps_critical,
                    self.config.max_coverage_critical,
                ),
            }
        };

        let quarter_ago = Utc::now() - Duration::days(90);
        let user_event_count = match reporter {
            Some(user) => self.history.paid_claim_count(user, quarter_ago).await,
            None => 0,
        };
        if reporter.is_some() && user_event_count >= self.config.user_event_limit {
            reasons.push(format!(
                "reporter reached the quarterly claim limit ({}/{})",
                user_event_count, self.config.user_event_limit
            ));
        }

        let monthly_payout_used = self
            .monthly_payout_used(&snapshot.country, snapshot.bucket)
            .await;
        let projected = monthly_payout_used.saturating_add(claim_amount);
        if projected > self.config.monthly_payout_cap {
            reasons.push(format!(
                "monthly payout cap exceeded for {}/{} ({} used of {})",
                snapshot.country,
                snapshot.bucket,
                monthly_payout_used,
                self.config.monthly_payout_cap
            ));
        }

        let eligible = reasons.is_empty();
        debug!(
            booking = %booking_id,
            eligible,
            ratio = report.ratio,
            "eligibility assessed"
        );

        Ok(EligibilityResult {
            eligible,
            reasons,
            solvency_ratio: report.ratio,
            solvency_status: report.status,
            franchise_bps,
            max_coverage,
            monthly_payout_used,
            monthly_payout_cap: self.config.monthly_payout_cap,
            user_event_count,
            user_event_limit: self.config.user_event_limit,
            fund_balance: report.current_balance,
        })
    }

    /// Claim payouts already made this calendar month for a segment
    async fn monthly_payout_used(
        &self,
        country: &lendaro_types::CountryCode,
        bucket: lendaro_types::RiskBucket,
    ) -> Amount {
        let now = Utc::now();
        let month_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);
        let movements = self
            .ledger
            .segment_movements_since(country, bucket, month_start)
            .await;
        movements
            .iter()
            .filter(|m| m.direction == MovementDirection::Payout && m.claim_id.is_some())
            .fold(Amount::ZERO, |acc, m| acc.saturating_add(m.amount))
    }
}
