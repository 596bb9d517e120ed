//! Collaborator seams for the settlement engine
//!
//! Real deployments plug gateway/wallet/inspection integrations in behind
//! these traits. The in-memory implementations below back the service
//! binary and the test suite.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lendaro_types::{
    Amount, BookingId, CaptureResult, ClaimId, DetectedDamage, GuaranteeMultipliers,
    InspectionReport, InspectionStage, LendaroError, Result, UserId, WalletDebitResult,
};
use tokio::sync::RwLock;

/// Gate for claim creation: both inspections must be validated complete
#[async_trait]
pub trait InspectionValidator: Send + Sync {
    async fn validate(&self, booking_id: &BookingId) -> Result<InspectionReport>;
}

/// Optional automated damage proposal from before/after images
#[async_trait]
pub trait DamageClassifier: Send + Sync {
    async fn compare(
        &self,
        before_images: &[String],
        after_images: &[String],
    ) -> Result<Vec<DetectedDamage>>;
}

/// External payment gateway holding pre-authorizations
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture_authorization(&self, auth_ref: &str, amount: Amount) -> Result<CaptureResult>;
}

/// Wallet ledger holding renter security credits
#[async_trait]
pub trait WalletLedger: Send + Sync {
    async fn debit_for_damage(
        &self,
        booking_id: &BookingId,
        claim_id: &ClaimId,
        amount: Amount,
    ) -> Result<WalletDebitResult>;
}

/// Read-only bonus-malus multiplier source
#[async_trait]
pub trait MultiplierSource: Send + Sync {
    async fn multipliers_for(&self, user: &UserId) -> Result<GuaranteeMultipliers>;
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// Inspection validator over a fixed report table
///
/// Bookings without an entry report both stages missing.
#[derive(Default)]
pub struct StaticInspectionValidator {
    reports: RwLock<HashMap<BookingId, InspectionReport>>,
}

impl StaticInspectionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_report(&self, booking_id: BookingId, report: InspectionReport) {
        self.reports.write().await.insert(booking_id, report);
    }

    /// Mark both inspections complete for a booking
    pub async fn mark_complete(&self, booking_id: BookingId) {
        self.set_report(
            booking_id,
            InspectionReport {
                valid: true,
                missing_stages: vec![],
            },
        )
        .await;
    }
}

#[async_trait]
impl InspectionValidator for StaticInspectionValidator {
    async fn validate(&self, booking_id: &BookingId) -> Result<InspectionReport> {
        Ok(self
            .reports
            .read()
            .await
            .get(booking_id)
            .cloned()
            .unwrap_or(InspectionReport {
                valid: false,
                missing_stages: vec![InspectionStage::CheckIn, InspectionStage::CheckOut],
            }))
    }
}

/// Gateway simulation over authorization references with remaining budgets
#[derive(Default)]
pub struct SimulatedGateway {
    authorizations: RwLock<HashMap<String, Amount>>,
    /// When set, every capture call fails with this message
    outage: RwLock<Option<String>>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn authorize(&self, auth_ref: impl Into<String>, amount: Amount) {
        self.authorizations
            .write()
            .await
            .insert(auth_ref.into(), amount);
    }

    pub async fn set_outage(&self, message: Option<String>) {
        *self.outage.write().await = message;
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn capture_authorization(&self, auth_ref: &str, amount: Amount) -> Result<CaptureResult> {
        if let Some(message) = self.outage.read().await.clone() {
            return Err(LendaroError::GatewayError { reason: message });
        }
        let mut authorizations = self.authorizations.write().await;
        match authorizations.get_mut(auth_ref) {
            Some(available) => {
                let captured = amount.min(*available);
                *available = available.saturating_sub(captured);
                Ok(CaptureResult {
                    ok: true,
                    captured_amount: captured,
                    error: None,
                })
            }
            None => Err(LendaroError::GatewayError {
                reason: format!("unknown authorization {auth_ref}"),
            }),
        }
    }
}

/// Wallet ledger simulation with per-booking security balances
///
/// Debits are partial on insufficient funds, mirroring the production
/// wallet contract.
#[derive(Default)]
pub struct InMemoryWallet {
    balances: RwLock<HashMap<BookingId, Amount>>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_balance(&self, booking_id: BookingId, amount: Amount) {
        self.balances.write().await.insert(booking_id, amount);
    }

    pub async fn balance(&self, booking_id: &BookingId) -> Amount {
        self.balances
            .read()
            .await
            .get(booking_id)
            .copied()
            .unwrap_or(Amount::ZERO)
    }
}

#[async_trait]
impl WalletLedger for InMemoryWallet {
    async fn debit_for_damage(
        &self,
        booking_id: &BookingId,
        _claim_id: &ClaimId,
        amount: Amount,
    ) -> Result<WalletDebitResult> {
        let mut balances = self.balances.write().await;
        let available = balances.get(booking_id).copied().unwrap_or(Amount::ZERO);
        let debited = amount.min(available);
        balances.insert(booking_id.clone(), available.saturating_sub(debited));
        if debited == amount {
            Ok(WalletDebitResult {
                success: true,
                debited_amount: debited,
                error: None,
            })
        } else {
            Ok(WalletDebitResult {
                success: false,
                debited_amount: debited,
                error: Some(format!(
                    "insufficient funds: requested {amount}, debited {debited}"
                )),
            })
        }
    }
}

/// Classifier stub returning a fixed proposal list
#[derive(Default)]
pub struct StaticClassifier {
    proposals: Arc<RwLock<Vec<DetectedDamage>>>,
}

impl StaticClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_proposals(&self, proposals: Vec<DetectedDamage>) {
        *self.proposals.write().await = proposals;
    }
}

#[async_trait]
impl DamageClassifier for StaticClassifier {
    async fn compare(
        &self,
        _before_images: &[String],
        _after_images: &[String],
    ) -> Result<Vec<DetectedDamage>> {
        Ok(self.proposals.read().await.clone())
    }
}

/// Multiplier source returning neutral multipliers for every user
pub struct NeutralMultiplierSource;

#[async_trait]
impl MultiplierSource for NeutralMultiplierSource {
    async fn multipliers_for(&self, _user: &UserId) -> Result<GuaranteeMultipliers> {
        Ok(GuaranteeMultipliers::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gateway_captures_up_to_the_authorization() {
        let gateway = SimulatedGateway::new();
        gateway.authorize("auth_1", Amount::cents(20_000)).await;

        let result = gateway
            .capture_authorization("auth_1", Amount::cents(15_000))
            .await
            .unwrap();
        assert!(result.ok);
        assert_eq!(result.captured_amount, Amount::cents(15_000));

        // only 5_000 left on the authorization
        let result = gateway
            .capture_authorization("auth_1", Amount::cents(10_000))
            .await
            .unwrap();
        assert_eq!(result.captured_amount, Amount::cents(5_000));
    }

    #[tokio::test]
    async fn wallet_reports_partial_debits() {
        let wallet = InMemoryWallet::new();
        let booking = BookingId::new();
        wallet.set_balance(booking.clone(), Amount::cents(2_000)).await;

        let result = wallet
            .debit_for_damage(&booking, &ClaimId::new(), Amount::cents(5_000))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.debited_amount, Amount::cents(2_000));
        assert_eq!(wallet.balance(&booking).await, Amount::ZERO);
    }

    #[tokio::test]
    async fn unknown_booking_reports_both_stages_missing() {
        let validator = StaticInspectionValidator::new();
        let report = validator.validate(&BookingId::new()).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.missing_stages.len(), 2);
    }

    #[tokio::test]
    async fn neutral_multipliers_are_identity() {
        let source = NeutralMultiplierSource;
        let multipliers = source.multipliers_for(&UserId::new()).await.unwrap();
        assert_eq!(multipliers.fee_multiplier, 1.0);
        assert_eq!(multipliers.guarantee_multiplier, 1.0);
    }
}
