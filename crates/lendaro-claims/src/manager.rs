//! Claim lifecycle orchestration
//!
//! The manager owns the path from creation gates through review to the
//! locked settlement run. Processing is the only place the optimistic
//! claim lock is taken, and every outcome of a processing run either
//! finalizes the claim (paid, rejected) or rolls it back to `approved`
//! for a later retry.

use std::sync::Arc;

use chrono::Duration;
use lendaro_eligibility::EligibilityAssessor;
use lendaro_risk::SnapshotStore;
use lendaro_types::{
    Amount, BookingId, Claim, ClaimId, ClaimStatus, DamageItem, DetectedDamage, EligibilityResult,
    LendaroError, Result, UserId, WaterfallBreakdown,
};
use tracing::{info, warn};

use crate::external::{DamageClassifier, InspectionValidator};
use crate::fraud::FraudValidator;
use crate::store::ClaimStore;
use crate::waterfall::SettlementExecutor;

/// Orchestration knobs
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Lock age beyond which a dead processor's lock may be taken over
    pub lock_staleness: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            lock_staleness: Duration::minutes(5),
        }
    }
}

/// Outcome of a settlement run
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Paid(WaterfallBreakdown),
    Rejected(Vec<String>),
}

/// Read-only settlement forecast; performs no writes anywhere
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub eligibility: EligibilityResult,
    /// Present when a snapshot exists; estimated from the snapshot's
    /// posture without touching the gateway, wallet or ledger
    pub estimated_breakdown: Option<WaterfallBreakdown>,
}

/// The claim lifecycle manager
pub struct ClaimManager {
    store: Arc<dyn ClaimStore>,
    snapshots: Arc<dyn SnapshotStore>,
    inspections: Arc<dyn InspectionValidator>,
    fraud: Arc<dyn FraudValidator>,
    classifier: Arc<dyn DamageClassifier>,
    assessor: EligibilityAssessor,
    executor: Arc<dyn SettlementExecutor>,
    config: ManagerConfig,
}

impl ClaimManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ClaimStore>,
        snapshots: Arc<dyn SnapshotStore>,
        inspections: Arc<dyn InspectionValidator>,
        fraud: Arc<dyn FraudValidator>,
        classifier: Arc<dyn DamageClassifier>,
        assessor: EligibilityAssessor,
        executor: Arc<dyn SettlementExecutor>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            store,
            snapshots,
            inspections,
            fraud,
            classifier,
            assessor,
            executor,
            config,
        }
    }

    /// Create a draft claim against a booking
    ///
    /// Gates, in order: both inspections validated complete, a risk
    /// snapshot exists, items are non-empty, anti-fraud rules pass. A
    /// fraud block means nothing is persisted; a validator outage fails
    /// open with a warning logged. The total is always recomputed from
    /// the items.
    pub async fn create(
        &self,
        booking_id: BookingId,
        reporter: UserId,
        items: Vec<DamageItem>,
        notes: Option<String>,
    ) -> Result<Claim> {
        let report = self.inspections.validate(&booking_id).await?;
        if !report.valid {
            return Err(LendaroError::InspectionIncomplete {
                booking_id: booking_id.0.clone(),
                missing: report
                    .missing_stages
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            });
        }

        if self.snapshots.get(&booking_id).await.is_none() {
            return Err(LendaroError::SnapshotNotFound {
                booking_id: booking_id.0.clone(),
            });
        }

        if items.is_empty() {
            return Err(LendaroError::validation("items", "at least one damage item required"));
        }

        let mut claim = Claim::new(booking_id, reporter, items, notes)?;

        let verdict = match self
            .fraud
            .validate(&claim.booking_id, &claim.reporter, claim.total_estimated)
            .await
        {
            Ok(verdict) => verdict,
            Err(err) => {
                // fail open: an anti-fraud outage never blocks legitimate claims
                warn!(
                    booking = %claim.booking_id,
                    error = %err,
                    "fraud validator unavailable, failing open"
                );
                Default::default()
            }
        };
        if verdict.is_blocked() {
            return Err(LendaroError::FraudBlocked {
                rules: verdict.blocks,
            });
        }
        claim.warnings = verdict.warnings;

        self.store.insert(claim.clone()).await?;
        info!(claim = %claim.id, booking = %claim.booking_id, "claim created");
        Ok(claim)
    }

    pub async fn submit(&self, id: &ClaimId) -> Result<Claim> {
        self.store.transition(id, ClaimStatus::Submitted).await
    }

    pub async fn start_review(&self, id: &ClaimId) -> Result<Claim> {
        self.store.transition(id, ClaimStatus::UnderReview).await
    }

    pub async fn approve(&self, id: &ClaimId) -> Result<Claim> {
        self.store.transition(id, ClaimStatus::Approved).await
    }

    /// Operator rejection before settlement
    ///
    /// Only `submitted` and `under_review` claims can be rejected here; a
    /// claim being settled belongs to its lock holder until the run
    /// finishes or the lock goes stale.
    pub async fn reject(&self, id: &ClaimId, reasons: Vec<String>) -> Result<Claim> {
        self.store.reject_review(id, reasons).await
    }

    /// Take the claim lock without settling
    ///
    /// Exposed for operators that split lock acquisition from execution;
    /// `process` does both in one call.
    pub async fn acquire_lock(&self, id: &ClaimId, actor: &UserId) -> Result<Claim> {
        self.store
            .try_acquire_lock(id, actor, self.config.lock_staleness)
            .await
    }

    /// Run the settlement for an approved claim
    ///
    /// Acquires the claim lock, re-derives eligibility, then either
    /// executes the waterfall and marks the claim paid, or rejects it with
    /// the full reasons list. An executor failure releases the lock so the
    /// claim stays retryable.
    pub async fn process(&self, id: &ClaimId, actor: &UserId) -> Result<ProcessOutcome> {
        let claim = self
            .store
            .try_acquire_lock(id, actor, self.config.lock_staleness)
            .await?;

        let snapshot = match self.snapshots.get(&claim.booking_id).await {
            Some(snapshot) => snapshot,
            None => {
                // snapshots are immutable, so this only happens on data loss
                self.store.release_lock(id).await?;
                return Err(LendaroError::SnapshotNotFound {
                    booking_id: claim.booking_id.0.clone(),
                });
            }
        };

        let claim_amount = match snapshot.fx_rate.convert(claim.total_estimated) {
            Ok(amount) => amount,
            Err(err) => {
                self.store.release_lock(id).await?;
                return Err(err);
            }
        };

        let eligibility = match self
            .assessor
            .assess(&claim.booking_id, Some(&claim.reporter), claim_amount)
            .await
        {
            Ok(eligibility) => eligibility,
            Err(err) => {
                self.store.release_lock(id).await?;
                return Err(err);
            }
        };

        if !eligibility.eligible {
            let reasons = eligibility.reasons.clone();
            self.store.mark_rejected(id, reasons.clone()).await?;
            info!(claim = %id, ?reasons, "claim rejected at settlement time");
            return Ok(ProcessOutcome::Rejected(reasons));
        }

        match self.executor.execute(&claim, &snapshot, &eligibility).await {
            Ok(breakdown) => {
                self.store.mark_paid(id, actor).await?;
                Ok(ProcessOutcome::Paid(breakdown))
            }
            Err(err) => {
                self.store.release_lock(id).await?;
                Err(err)
            }
        }
    }

    /// Forecast a settlement without creating a claim or writing anywhere
    ///
    /// The breakdown estimate assumes every funding source delivers its
    /// full snapshot posture; live captures and debits may come in lower.
    pub async fn simulate(
        &self,
        booking_id: &BookingId,
        claim_amount: Amount,
    ) -> Result<SimulationResult> {
        let eligibility = self.assessor.assess(booking_id, None, claim_amount).await?;

        let estimated_breakdown = match self.snapshots.get(booking_id).await {
            Some(snapshot) => {
                let amount = snapshot.fx_rate.convert(claim_amount)?;
                let mut remaining = amount;

                let hold = if snapshot.has_card_hold {
                    remaining.min(snapshot.hold_amount)
                } else {
                    Amount::ZERO
                };
                remaining = remaining.saturating_sub(hold);

                let wallet = if !snapshot.has_card_hold && snapshot.has_wallet_security {
                    remaining.min(snapshot.wallet_security_amount)
                } else {
                    Amount::ZERO
                };
                remaining = remaining.saturating_sub(wallet);

                let fund = if eligibility.eligible {
                    remaining
                } else {
                    Amount::ZERO
                };
                remaining = remaining.saturating_sub(fund);

                Some(WaterfallBreakdown {
                    claim_amount: amount,
                    hold_captured: hold,
                    wallet_debited: wallet,
                    extra_charged: Amount::ZERO,
                    fund_paid: fund,
                    remaining_uncovered: remaining,
                })
            }
            None => None,
        };

        Ok(SimulationResult {
            eligibility,
            estimated_breakdown,
        })
    }

    /// Propose damage items from before/after inspection images
    ///
    /// Assistive only: proposals are never turned into a claim without a
    /// human picking them up.
    pub async fn propose_damages(
        &self,
        before_images: &[String],
        after_images: &[String],
    ) -> Result<Vec<DetectedDamage>> {
        self.classifier.compare(before_images, after_images).await
    }

    pub async fn get(&self, id: &ClaimId) -> Option<Claim> {
        self.store.get(id).await
    }

    pub async fn by_booking(&self, booking_id: &BookingId) -> Vec<Claim> {
        self.store.by_booking(booking_id).await
    }

    pub async fn by_status(&self, status: ClaimStatus) -> Vec<Claim> {
        self.store.by_status(status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{
        InMemoryWallet, SimulatedGateway, StaticClassifier, StaticInspectionValidator,
    };
    use crate::fraud::{FraudConfig, RuleBasedFraudValidator, StaticBookingInfo};
    use crate::store::InMemoryClaimStore;
    use crate::waterfall::WaterfallExecutor;
    use async_trait::async_trait;
    use lendaro_eligibility::EligibilityConfig;
    use lendaro_fund::FundLedger;
    use lendaro_risk::{InMemorySnapshotStore, SnapshotParams};
    use lendaro_stats::{LossStatsEngine, StatsConfig};
    use lendaro_types::{
        AdminId, CountryCode, Currency, DamageType, FraudWarning, FxRate, RiskBucket,
        RiskSnapshot, Severity, SubAccount,
    };

    struct Fixture {
        manager: ClaimManager,
        store: Arc<InMemoryClaimStore>,
        inspections: Arc<StaticInspectionValidator>,
        gateway: Arc<SimulatedGateway>,
        wallet: Arc<InMemoryWallet>,
        fund: Arc<FundLedger>,
        snapshots: Arc<InMemorySnapshotStore>,
    }

    async fn fixture(fraud: Option<Arc<dyn FraudValidator>>) -> Fixture {
        fixture_with(fraud, None).await
    }

    async fn fixture_with(
        fraud: Option<Arc<dyn FraudValidator>>,
        executor: Option<Arc<dyn SettlementExecutor>>,
    ) -> Fixture {
        let admin = AdminId::new();
        let store = Arc::new(InMemoryClaimStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let inspections = Arc::new(StaticInspectionValidator::new());
        let gateway = Arc::new(SimulatedGateway::new());
        let wallet = Arc::new(InMemoryWallet::new());
        let fund = Arc::new(FundLedger::new([admin.clone()]));
        fund.contribute(
            SubAccount::Liquidity,
            Amount::cents(1_000_000),
            CountryCode::new("FR"),
            RiskBucket::Default,
            None,
            "seed",
        )
        .await
        .unwrap();

        let stats = Arc::new(LossStatsEngine::new(
            fund.clone(),
            [admin],
            StatsConfig::default(),
        ));
        let assessor = EligibilityAssessor::new(
            snapshots.clone(),
            stats,
            fund.clone(),
            store.clone(),
            EligibilityConfig::default(),
        );
        let executor = executor.unwrap_or_else(|| {
            Arc::new(WaterfallExecutor::new(
                gateway.clone(),
                wallet.clone(),
                fund.clone(),
            ))
        });
        let fraud = fraud.unwrap_or_else(|| {
            Arc::new(RuleBasedFraudValidator::new(
                store.clone(),
                Arc::new(StaticBookingInfo::new()),
                FraudConfig::default(),
            ))
        });
        let manager = ClaimManager::new(
            store.clone(),
            snapshots.clone(),
            inspections.clone(),
            fraud,
            Arc::new(StaticClassifier::new()),
            assessor,
            executor,
            ManagerConfig::default(),
        );
        Fixture {
            manager,
            store,
            inspections,
            gateway,
            wallet,
            fund,
            snapshots,
        }
    }

    async fn snapshot_with_hold(fx: &Fixture, hold: u64, has_card_hold: bool) -> BookingId {
        let booking = BookingId::new();
        fx.snapshots
            .create(SnapshotParams {
                booking_id: booking.clone(),
                country: CountryCode::new("FR"),
                bucket: RiskBucket::Default,
                currency: Currency::Eur,
                fx_rate: FxRate::unity(),
                hold_amount: Amount::cents(hold),
                wallet_security_amount: Amount::cents(5_000),
                franchise_amount: Amount::cents(15_000),
                has_card_hold,
                has_wallet_security: !has_card_hold,
                authorization_ref: has_card_hold.then(|| "auth_1".to_string()),
            })
            .await
            .unwrap();
        fx.inspections.mark_complete(booking.clone()).await;
        booking
    }

    fn items(total: u64) -> Vec<DamageItem> {
        vec![DamageItem {
            damage_type: DamageType::Mechanical,
            description: "seized focus ring".to_string(),
            severity: Severity::Severe,
            estimated_cost: Amount::cents(total),
            evidence: vec!["img_1".to_string()],
        }]
    }

    #[tokio::test]
    async fn full_lifecycle_hold_then_fund() {
        let fx = fixture(None).await;
        let booking = snapshot_with_hold(&fx, 20_000, true).await;
        fx.gateway.authorize("auth_1", Amount::cents(20_000)).await;

        let claim = fx
            .manager
            .create(booking, UserId::new(), items(80_000), None)
            .await
            .unwrap();
        assert_eq!(claim.total_estimated, Amount::cents(80_000));

        fx.manager.submit(&claim.id).await.unwrap();
        fx.manager.start_review(&claim.id).await.unwrap();
        fx.manager.approve(&claim.id).await.unwrap();

        let outcome = fx.manager.process(&claim.id, &UserId::new()).await.unwrap();
        let breakdown = match outcome {
            ProcessOutcome::Paid(b) => b,
            ProcessOutcome::Rejected(reasons) => panic!("rejected: {reasons:?}"),
        };
        assert_eq!(breakdown.hold_captured, Amount::cents(20_000));
        assert_eq!(breakdown.fund_paid, Amount::cents(60_000));
        assert!(breakdown.is_balanced());

        let stored = fx.store.get(&claim.id).await.unwrap();
        assert_eq!(stored.status, ClaimStatus::Paid);
        assert!(stored.processed_at.is_some());
        assert_eq!(fx.fund.movements_for_claim(&claim.id).await.len(), 1);
    }

    #[tokio::test]
    async fn incomplete_inspections_block_creation() {
        let fx = fixture(None).await;
        let booking = snapshot_with_hold(&fx, 20_000, true).await;
        // overwrite with a report missing check-out
        fx.inspections
            .set_report(
                booking.clone(),
                lendaro_types::InspectionReport {
                    valid: false,
                    missing_stages: vec![lendaro_types::InspectionStage::CheckOut],
                },
            )
            .await;

        let err = fx
            .manager
            .create(booking, UserId::new(), items(10_000), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LendaroError::InspectionIncomplete { .. }));
    }

    #[tokio::test]
    async fn missing_snapshot_blocks_creation() {
        let fx = fixture(None).await;
        let booking = BookingId::new();
        fx.inspections.mark_complete(booking.clone()).await;

        let err = fx
            .manager
            .create(booking, UserId::new(), items(10_000), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LendaroError::SnapshotNotFound { .. }));
    }

    #[tokio::test]
    async fn fraud_block_persists_nothing() {
        let fx = fixture(None).await;
        let booking = snapshot_with_hold(&fx, 20_000, true).await;
        let reporter = UserId::new();

        // three recent claims by the same reporter trip the velocity rule
        for _ in 0..3 {
            let other = snapshot_with_hold(&fx, 20_000, true).await;
            fx.manager
                .create(other, reporter.clone(), items(10_000), None)
                .await
                .unwrap();
        }

        let err = fx
            .manager
            .create(booking.clone(), reporter, items(10_000), None)
            .await
            .unwrap_err();
        match err {
            LendaroError::FraudBlocked { rules } => {
                assert!(rules.iter().any(|r| r.contains("claim_velocity")));
            }
            other => panic!("expected FraudBlocked, got {other:?}"),
        }
        assert!(fx.manager.by_booking(&booking).await.is_empty());
    }

    #[tokio::test]
    async fn fraud_outage_fails_open() {
        struct BrokenValidator;

        #[async_trait]
        impl FraudValidator for BrokenValidator {
            async fn validate(
                &self,
                _booking_id: &BookingId,
                _reporter: &UserId,
                _total: Amount,
            ) -> lendaro_types::Result<crate::fraud::FraudVerdict> {
                Err(LendaroError::FraudValidatorUnavailable {
                    reason: "upstream timeout".to_string(),
                })
            }
        }

        let fx = fixture(Some(Arc::new(BrokenValidator))).await;
        let booking = snapshot_with_hold(&fx, 20_000, true).await;

        let claim = fx
            .manager
            .create(booking, UserId::new(), items(10_000), None)
            .await
            .unwrap();
        assert!(claim.warnings.is_empty());
        assert_eq!(claim.status, ClaimStatus::Draft);
    }

    #[tokio::test]
    async fn warnings_ride_along_without_blocking() {
        let fx = fixture(None).await;
        let booking = snapshot_with_hold(&fx, 20_000, true).await;

        // above the high-amount threshold and round
        let claim = fx
            .manager
            .create(booking, UserId::new(), items(600_000), None)
            .await
            .unwrap();
        let rules: Vec<&str> = claim.warnings.iter().map(|w: &FraudWarning| w.rule.as_str()).collect();
        assert!(rules.contains(&"high_amount"));
    }

    #[tokio::test]
    async fn wallet_path_settles_without_a_hold() {
        let fx = fixture(None).await;
        let booking = snapshot_with_hold(&fx, 0, false).await;
        fx.wallet
            .set_balance(booking.clone(), Amount::cents(5_000))
            .await;

        let claim = fx
            .manager
            .create(booking, UserId::new(), items(30_000), None)
            .await
            .unwrap();
        fx.manager.submit(&claim.id).await.unwrap();
        fx.manager.start_review(&claim.id).await.unwrap();
        fx.manager.approve(&claim.id).await.unwrap();

        let outcome = fx.manager.process(&claim.id, &UserId::new()).await.unwrap();
        match outcome {
            ProcessOutcome::Paid(breakdown) => {
                assert_eq!(breakdown.wallet_debited, Amount::cents(5_000));
                assert_eq!(breakdown.fund_paid, Amount::cents(25_000));
                assert!(breakdown.is_balanced());
            }
            ProcessOutcome::Rejected(reasons) => panic!("rejected: {reasons:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_processing_pays_exactly_once() {
        let fx = fixture(None).await;
        let booking = snapshot_with_hold(&fx, 20_000, true).await;
        fx.gateway.authorize("auth_1", Amount::cents(20_000)).await;

        let claim = fx
            .manager
            .create(booking, UserId::new(), items(50_000), None)
            .await
            .unwrap();
        fx.manager.submit(&claim.id).await.unwrap();
        fx.manager.start_review(&claim.id).await.unwrap();
        fx.manager.approve(&claim.id).await.unwrap();

        let actor_a = UserId::new();
        let actor_b = UserId::new();
        let (a, b) = tokio::join!(
            fx.manager.process(&claim.id, &actor_a),
            fx.manager.process(&claim.id, &actor_b),
        );
        let successes = a.is_ok() as u8 + b.is_ok() as u8;
        assert_eq!(successes, 1, "exactly one processor settles");
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser.unwrap_err(), LendaroError::ClaimLocked { .. }));
        // one ledger movement, not two
        assert_eq!(fx.fund.movements_for_claim(&claim.id).await.len(), 1);
    }

    #[tokio::test]
    async fn executor_failure_releases_the_lock() {
        struct FailingExecutor;

        #[async_trait]
        impl SettlementExecutor for FailingExecutor {
            async fn execute(
                &self,
                _claim: &Claim,
                _snapshot: &RiskSnapshot,
                _eligibility: &EligibilityResult,
            ) -> lendaro_types::Result<WaterfallBreakdown> {
                Err(LendaroError::GatewayError {
                    reason: "settlement backend down".to_string(),
                })
            }
        }

        let fx = fixture_with(None, Some(Arc::new(FailingExecutor))).await;
        let booking = snapshot_with_hold(&fx, 20_000, true).await;

        let claim = fx
            .manager
            .create(booking, UserId::new(), items(50_000), None)
            .await
            .unwrap();
        fx.manager.submit(&claim.id).await.unwrap();
        fx.manager.start_review(&claim.id).await.unwrap();
        fx.manager.approve(&claim.id).await.unwrap();

        let err = fx.manager.process(&claim.id, &UserId::new()).await.unwrap_err();
        assert!(matches!(err, LendaroError::GatewayError { .. }));

        // the claim rolled back to approved with the lock cleared, so a
        // later run can pick it up
        let stored = fx.store.get(&claim.id).await.unwrap();
        assert_eq!(stored.status, ClaimStatus::Approved);
        assert!(stored.locked_at.is_none());
        assert!(stored.locked_by.is_none());
    }

    #[tokio::test]
    async fn reject_is_refused_while_a_processor_holds_the_lock() {
        let fx = fixture(None).await;
        let booking = snapshot_with_hold(&fx, 20_000, true).await;

        let claim = fx
            .manager
            .create(booking, UserId::new(), items(50_000), None)
            .await
            .unwrap();
        fx.manager.submit(&claim.id).await.unwrap();
        fx.manager.start_review(&claim.id).await.unwrap();
        fx.manager.approve(&claim.id).await.unwrap();
        fx.manager.acquire_lock(&claim.id, &UserId::new()).await.unwrap();

        let err = fx
            .manager
            .reject(&claim.id, vec!["operator override".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LendaroError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn ineligible_claim_is_rejected_with_all_reasons() {
        let fx = fixture(None).await;
        let booking = snapshot_with_hold(&fx, 0, false).await;

        // drain solvency below the hard floor: heavy recent losses against
        // a thin balance
        for _ in 0..2 {
            fx.fund
                .payout(lendaro_fund::PayoutParams {
                    amount: Amount::cents(450_000),
                    country: CountryCode::new("FR"),
                    bucket: RiskBucket::Default,
                    booking_id: BookingId::new(),
                    claim_id: lendaro_types::ClaimId::new(),
                    fx_rate: 1.0,
                    solvency_ratio: 1.0,
                })
                .await
                .unwrap();
        }

        let claim = fx
            .manager
            .create(booking, UserId::new(), items(30_000), None)
            .await
            .unwrap();
        fx.manager.submit(&claim.id).await.unwrap();
        fx.manager.start_review(&claim.id).await.unwrap();
        fx.manager.approve(&claim.id).await.unwrap();

        let outcome = fx.manager.process(&claim.id, &UserId::new()).await.unwrap();
        match outcome {
            ProcessOutcome::Rejected(reasons) => {
                assert!(reasons.iter().any(|r| r.contains("hard floor")));
            }
            ProcessOutcome::Paid(_) => panic!("should have been rejected"),
        }
        let stored = fx.store.get(&claim.id).await.unwrap();
        assert_eq!(stored.status, ClaimStatus::Rejected);
        assert!(!stored.rejection_reasons.is_empty());
    }

    #[tokio::test]
    async fn simulate_is_pure_and_idempotent() {
        let fx = fixture(None).await;
        let booking = snapshot_with_hold(&fx, 20_000, true).await;

        let movements_before = fx.fund.movement_count().await;
        let first = fx
            .manager
            .simulate(&booking, Amount::cents(80_000))
            .await
            .unwrap();
        let second = fx
            .manager
            .simulate(&booking, Amount::cents(80_000))
            .await
            .unwrap();

        let breakdown = first.estimated_breakdown.clone().unwrap();
        assert_eq!(breakdown.hold_captured, Amount::cents(20_000));
        assert_eq!(breakdown.fund_paid, Amount::cents(60_000));
        assert!(breakdown.is_balanced());
        assert_eq!(first.estimated_breakdown, second.estimated_breakdown);
        assert_eq!(fx.fund.movement_count().await, movements_before);
        // no claim was created either
        assert!(fx.manager.by_booking(&booking).await.is_empty());
    }

    #[tokio::test]
    async fn simulate_without_snapshot_reports_ineligibility() {
        let fx = fixture(None).await;
        let result = fx
            .manager
            .simulate(&BookingId::new(), Amount::cents(10_000))
            .await
            .unwrap();
        assert!(!result.eligibility.eligible);
        assert!(result.estimated_breakdown.is_none());
    }
}
