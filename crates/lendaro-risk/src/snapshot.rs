//! Risk snapshot store
//!
//! One snapshot per booking, created at confirmation and immutable after.
//! There is deliberately no upsert: creating a second snapshot for the
//! same booking is a caller logic error and fails loudly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lendaro_types::{
    Amount, BookingId, CountryCode, Currency, FxRate, LendaroError, Result, RiskBucket,
    RiskSnapshot,
};
use tokio::sync::RwLock;
use tracing::info;

/// Inputs for snapshot creation, captured at booking confirmation
#[derive(Debug, Clone)]
pub struct SnapshotParams {
    pub booking_id: BookingId,
    pub country: CountryCode,
    pub bucket: RiskBucket,
    pub currency: Currency,
    pub fx_rate: FxRate,
    pub hold_amount: Amount,
    pub wallet_security_amount: Amount,
    pub franchise_amount: Amount,
    pub has_card_hold: bool,
    pub has_wallet_security: bool,
    pub authorization_ref: Option<String>,
}

/// Persistence seam for risk snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Create the snapshot for a booking, exactly once
    async fn create(&self, params: SnapshotParams) -> Result<RiskSnapshot>;

    /// Read-only lookup; `None` means the booking was never funded and is
    /// a valid state callers must handle explicitly
    async fn get(&self, booking_id: &BookingId) -> Option<RiskSnapshot>;
}

/// In-memory snapshot store
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Arc<RwLock<HashMap<BookingId, RiskSnapshot>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn create(&self, params: SnapshotParams) -> Result<RiskSnapshot> {
        if !params.fx_rate.is_valid() {
            return Err(LendaroError::validation(
                "fx_rate",
                "rate must be positive and finite",
            ));
        }
        if params.has_card_hold && params.authorization_ref.is_none() {
            return Err(LendaroError::validation(
                "authorization_ref",
                "card hold requires an authorization reference",
            ));
        }

        let mut snapshots = self.snapshots.write().await;
        if snapshots.contains_key(&params.booking_id) {
            return Err(LendaroError::SnapshotExists {
                booking_id: params.booking_id.0.clone(),
            });
        }

        let snapshot = RiskSnapshot {
            booking_id: params.booking_id.clone(),
            country: params.country,
            bucket: params.bucket,
            currency: params.currency,
            fx_rate: params.fx_rate,
            hold_amount: params.hold_amount,
            wallet_security_amount: params.wallet_security_amount,
            franchise_amount: params.franchise_amount,
            has_card_hold: params.has_card_hold,
            has_wallet_security: params.has_wallet_security,
            authorization_ref: params.authorization_ref,
            created_at: Utc::now(),
        };

        snapshots.insert(params.booking_id.clone(), snapshot.clone());
        info!(
            booking = %params.booking_id,
            bucket = %snapshot.bucket,
            hold = %snapshot.hold_amount,
            "risk snapshot created"
        );
        Ok(snapshot)
    }

    async fn get(&self, booking_id: &BookingId) -> Option<RiskSnapshot> {
        self.snapshots.read().await.get(booking_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(booking_id: BookingId) -> SnapshotParams {
        SnapshotParams {
            booking_id,
            country: CountryCode::new("FR"),
            bucket: RiskBucket::Default,
            currency: Currency::Eur,
            fx_rate: FxRate::unity(),
            hold_amount: Amount::cents(20_000),
            wallet_security_amount: Amount::cents(5_000),
            franchise_amount: Amount::cents(15_000),
            has_card_hold: true,
            has_wallet_security: false,
            authorization_ref: Some("auth_123".to_string()),
        }
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = InMemorySnapshotStore::new();
        let booking = BookingId::new();
        let created = store.create(params(booking.clone())).await.unwrap();
        let fetched = store.get(&booking).await.unwrap();
        assert_eq!(fetched.booking_id, created.booking_id);
        assert_eq!(fetched.hold_amount, Amount::cents(20_000));
    }

    #[tokio::test]
    async fn duplicate_creation_fails() {
        let store = InMemorySnapshotStore::new();
        let booking = BookingId::new();
        store.create(params(booking.clone())).await.unwrap();
        let err = store.create(params(booking)).await.unwrap_err();
        assert!(matches!(err, LendaroError::SnapshotExists { .. }));
    }

    #[tokio::test]
    async fn absence_is_a_valid_state() {
        let store = InMemorySnapshotStore::new();
        assert!(store.get(&BookingId::new()).await.is_none());
    }

    #[tokio::test]
    async fn card_hold_requires_authorization_ref() {
        let store = InMemorySnapshotStore::new();
        let mut p = params(BookingId::new());
        p.authorization_ref = None;
        assert!(matches!(
            store.create(p).await.unwrap_err(),
            LendaroError::Validation { .. }
        ));
    }
}
