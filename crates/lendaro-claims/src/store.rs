//! Claim persistence and the optimistic claim lock
//!
//! Every state-changing operation here is a conditional update evaluated
//! under a single write section, giving compare-and-swap semantics: the
//! precondition check and the write are indivisible, so two concurrent
//! processors can never both acquire the same claim.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lendaro_eligibility::ClaimHistory;
use lendaro_types::{
    BookingId, Claim, ClaimId, ClaimStatus, LendaroError, Result, UserId,
};
use tokio::sync::RwLock;
use tracing::info;

/// Persistence seam for claims
#[async_trait]
pub trait ClaimStore: Send + Sync {
    async fn insert(&self, claim: Claim) -> Result<()>;
    async fn get(&self, id: &ClaimId) -> Option<Claim>;
    async fn by_booking(&self, booking_id: &BookingId) -> Vec<Claim>;
    async fn by_status(&self, status: ClaimStatus) -> Vec<Claim>;

    /// Claims created by a reporter since a point in time (fraud velocity)
    async fn claims_created_since(&self, reporter: &UserId, since: DateTime<Utc>) -> u32;

    /// Forward transition through the ordinary state machine
    async fn transition(&self, id: &ClaimId, to: ClaimStatus) -> Result<Claim>;

    /// The sole concurrency-control primitive: one conditional write that
    /// succeeds only if the claim is `Approved` and unlocked (or its lock
    /// is older than `staleness`), or `Processing` under a lock older than
    /// `staleness` (the holder died mid-settlement), moving it to
    /// `Processing` with {locked_at, locked_by} set. Losing the race is
    /// `ClaimLocked` and is never retried automatically.
    async fn try_acquire_lock(
        &self,
        id: &ClaimId,
        actor: &UserId,
        staleness: Duration,
    ) -> Result<Claim>;

    /// Terminal success: `Processing` (locked by `actor`) -> `Paid`,
    /// stamping `processed_at` and clearing the lock
    async fn mark_paid(&self, id: &ClaimId, actor: &UserId) -> Result<Claim>;

    /// Rollback after a failed execution: `Processing` -> `Approved`,
    /// clearing the lock so the claim can be retried
    async fn release_lock(&self, id: &ClaimId) -> Result<Claim>;

    /// Terminal rejection with the complete reasons list; the terminal
    /// state invalidates any lock. Used by the settlement path, which may
    /// reject its own `Processing` claim.
    async fn mark_rejected(&self, id: &ClaimId, reasons: Vec<String>) -> Result<Claim>;

    /// Operator-facing rejection, allowed only before settlement starts
    /// (`Submitted` or `UnderReview`); a claim under a live lock is
    /// finalized by its processor, never from outside
    async fn reject_review(&self, id: &ClaimId, reasons: Vec<String>) -> Result<Claim>;
}

/// In-memory claim store
#[derive(Clone, Default)]
pub struct InMemoryClaimStore {
    claims: Arc<RwLock<HashMap<ClaimId, Claim>>>,
}

impl InMemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClaimStore for InMemoryClaimStore {
    async fn insert(&self, claim: Claim) -> Result<()> {
        let mut claims = self.claims.write().await;
        if claims.contains_key(&claim.id) {
            return Err(LendaroError::internal(format!(
                "claim {} already exists",
                claim.id
            )));
        }
        claims.insert(claim.id.clone(), claim);
        Ok(())
    }

    async fn get(&self, id: &ClaimId) -> Option<Claim> {
        self.claims.read().await.get(id).cloned()
    }

    async fn by_booking(&self, booking_id: &BookingId) -> Vec<Claim> {
        self.claims
            .read()
            .await
            .values()
            .filter(|c| &c.booking_id == booking_id)
            .cloned()
            .collect()
    }

    async fn by_status(&self, status: ClaimStatus) -> Vec<Claim> {
        self.claims
            .read()
            .await
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect()
    }

    async fn claims_created_since(&self, reporter: &UserId, since: DateTime<Utc>) -> u32 {
        self.claims
            .read()
            .await
            .values()
            .filter(|c| &c.reporter == reporter && c.created_at >= since)
            .count() as u32
    }

    async fn transition(&self, id: &ClaimId, to: ClaimStatus) -> Result<Claim> {
        let mut claims = self.claims.write().await;
        let claim = claims.get_mut(id).ok_or_else(|| LendaroError::ClaimNotFound {
            claim_id: id.0.clone(),
        })?;
        if !claim.status.can_transition_to(to) {
            return Err(LendaroError::invalid_transition(id, claim.status, to));
        }
        claim.status = to;
        claim.updated_at = Utc::now();
        Ok(claim.clone())
    }

    async fn try_acquire_lock(
        &self,
        id: &ClaimId,
        actor: &UserId,
        staleness: Duration,
    ) -> Result<Claim> {
        let now = Utc::now();
        let mut claims = self.claims.write().await;
        let claim = claims.get_mut(id).ok_or_else(|| LendaroError::ClaimNotFound {
            claim_id: id.0.clone(),
        })?;

        // Single conditional write. Acquirable states: Approved with no
        // lock or a stale one, or Processing under a stale lock left by a
        // processor that died mid-settlement.
        let acquirable = match claim.status {
            ClaimStatus::Approved => claim.lock_is_stale(now, staleness),
            ClaimStatus::Processing => {
                claim.locked_at.is_some() && claim.lock_is_stale(now, staleness)
            }
            _ => false,
        };
        if !acquirable {
            return Err(LendaroError::ClaimLocked {
                claim_id: id.0.clone(),
            });
        }

        claim.status = ClaimStatus::Processing;
        claim.locked_at = Some(now);
        claim.locked_by = Some(actor.clone());
        claim.updated_at = now;
        info!(claim = %id, actor = %actor, "claim lock acquired");
        Ok(claim.clone())
    }

    async fn mark_paid(&self, id: &ClaimId, actor: &UserId) -> Result<Claim> {
        let mut claims = self.claims.write().await;
        let claim = claims.get_mut(id).ok_or_else(|| LendaroError::ClaimNotFound {
            claim_id: id.0.clone(),
        })?;
        if claim.status != ClaimStatus::Processing || claim.locked_by.as_ref() != Some(actor) {
            return Err(LendaroError::invalid_transition(
                id,
                claim.status,
                ClaimStatus::Paid,
            ));
        }
        let now = Utc::now();
        claim.status = ClaimStatus::Paid;
        claim.processed_at = Some(now);
        claim.locked_at = None;
        claim.locked_by = None;
        claim.updated_at = now;
        Ok(claim.clone())
    }

    async fn release_lock(&self, id: &ClaimId) -> Result<Claim> {
        let mut claims = self.claims.write().await;
        let claim = claims.get_mut(id).ok_or_else(|| LendaroError::ClaimNotFound {
            claim_id: id.0.clone(),
        })?;
        if claim.status != ClaimStatus::Processing {
            return Err(LendaroError::invalid_transition(
                id,
                claim.status,
                ClaimStatus::Approved,
            ));
        }
        claim.status = ClaimStatus::Approved;
        claim.locked_at = None;
        claim.locked_by = None;
        claim.updated_at = Utc::now();
        info!(claim = %id, "claim lock released back to approved");
        Ok(claim.clone())
    }

    async fn mark_rejected(&self, id: &ClaimId, reasons: Vec<String>) -> Result<Claim> {
        let mut claims = self.claims.write().await;
        let claim = claims.get_mut(id).ok_or_else(|| LendaroError::ClaimNotFound {
            claim_id: id.0.clone(),
        })?;
        let allowed = matches!(
            claim.status,
            ClaimStatus::Submitted | ClaimStatus::UnderReview | ClaimStatus::Processing
        );
        if !allowed {
            return Err(LendaroError::invalid_transition(
                id,
                claim.status,
                ClaimStatus::Rejected,
            ));
        }
        claim.status = ClaimStatus::Rejected;
        claim.rejection_reasons = reasons;
        claim.locked_at = None;
        claim.locked_by = None;
        claim.updated_at = Utc::now();
        Ok(claim.clone())
    }

    async fn reject_review(&self, id: &ClaimId, reasons: Vec<String>) -> Result<Claim> {
        let mut claims = self.claims.write().await;
        let claim = claims.get_mut(id).ok_or_else(|| LendaroError::ClaimNotFound {
            claim_id: id.0.clone(),
        })?;
        let allowed = matches!(
            claim.status,
            ClaimStatus::Submitted | ClaimStatus::UnderReview
        );
        if !allowed {
            return Err(LendaroError::invalid_transition(
                id,
                claim.status,
                ClaimStatus::Rejected,
            ));
        }
        claim.status = ClaimStatus::Rejected;
        claim.rejection_reasons = reasons;
        claim.updated_at = Utc::now();
        Ok(claim.clone())
    }
}

#[async_trait]
impl ClaimHistory for InMemoryClaimStore {
    async fn paid_claim_count(&self, user: &UserId, since: DateTime<Utc>) -> u32 {
        self.claims
            .read()
            .await
            .values()
            .filter(|c| {
                &c.reporter == user
                    && c.status == ClaimStatus::Paid
                    && c.processed_at.map_or(false, |at| at >= since)
            })
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendaro_types::{Amount, DamageItem, DamageType, Severity};

    fn approved_claim() -> Claim {
        let mut claim = Claim::new(
            BookingId::new(),
            UserId::new(),
            vec![DamageItem {
                damage_type: DamageType::Dent,
                description: "dented side panel".to_string(),
                severity: Severity::Moderate,
                estimated_cost: Amount::cents(30_000),
                evidence: vec![],
            }],
            None,
        )
        .unwrap();
        claim.status = ClaimStatus::Approved;
        claim
    }

    #[tokio::test]
    async fn lock_acquisition_is_mutually_exclusive() {
        let store = InMemoryClaimStore::new();
        let claim = approved_claim();
        let id = claim.id.clone();
        store.insert(claim).await.unwrap();

        let staleness = Duration::minutes(5);
        let actor_a = UserId::new();
        let actor_b = UserId::new();
        let (a, b) = tokio::join!(
            store.try_acquire_lock(&id, &actor_a, staleness),
            store.try_acquire_lock(&id, &actor_b, staleness),
        );
        // exactly one concurrent caller wins
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser.unwrap_err(), LendaroError::ClaimLocked { .. }));
    }

    #[tokio::test]
    async fn stale_lock_is_reacquirable_by_another_actor() {
        let store = InMemoryClaimStore::new();
        let mut claim = approved_claim();
        let id = claim.id.clone();
        // simulate a processor that died six minutes ago
        claim.locked_at = Some(Utc::now() - Duration::minutes(6));
        claim.locked_by = Some(UserId::new());
        store.insert(claim).await.unwrap();

        let rescuer = UserId::new();
        let locked = store
            .try_acquire_lock(&id, &rescuer, Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(locked.status, ClaimStatus::Processing);
        assert_eq!(locked.locked_by, Some(rescuer));
    }

    #[tokio::test]
    async fn crashed_processor_lock_self_heals() {
        let store = InMemoryClaimStore::new();
        let claim = approved_claim();
        let id = claim.id.clone();
        store.insert(claim).await.unwrap();

        let staleness = Duration::minutes(5);
        store
            .try_acquire_lock(&id, &UserId::new(), staleness)
            .await
            .unwrap();
        // the processor dies mid-settlement: no release, no mark_paid.
        // Age the lock past the staleness window.
        {
            let mut claims = store.claims.write().await;
            let stuck = claims.get_mut(&id).unwrap();
            assert_eq!(stuck.status, ClaimStatus::Processing);
            stuck.locked_at = Some(Utc::now() - Duration::minutes(10));
        }

        let rescuer = UserId::new();
        let locked = store
            .try_acquire_lock(&id, &rescuer, staleness)
            .await
            .unwrap();
        assert_eq!(locked.status, ClaimStatus::Processing);
        assert_eq!(locked.locked_by, Some(rescuer.clone()));

        // the rescuer owns the claim and can finalize it
        let paid = store.mark_paid(&id, &rescuer).await.unwrap();
        assert_eq!(paid.status, ClaimStatus::Paid);
    }

    #[tokio::test]
    async fn fresh_lock_blocks_takeover() {
        let store = InMemoryClaimStore::new();
        let claim = approved_claim();
        let id = claim.id.clone();
        store.insert(claim).await.unwrap();

        store
            .try_acquire_lock(&id, &UserId::new(), Duration::minutes(5))
            .await
            .unwrap();
        let err = store
            .try_acquire_lock(&id, &UserId::new(), Duration::minutes(5))
            .await
            .unwrap_err();
        assert!(matches!(err, LendaroError::ClaimLocked { .. }));
    }

    #[tokio::test]
    async fn lock_requires_approved_status() {
        let store = InMemoryClaimStore::new();
        let mut claim = approved_claim();
        claim.status = ClaimStatus::Submitted;
        let id = claim.id.clone();
        store.insert(claim).await.unwrap();

        let err = store
            .try_acquire_lock(&id, &UserId::new(), Duration::minutes(5))
            .await
            .unwrap_err();
        assert!(matches!(err, LendaroError::ClaimLocked { .. }));
    }

    #[tokio::test]
    async fn mark_paid_requires_the_lock_holder() {
        let store = InMemoryClaimStore::new();
        let claim = approved_claim();
        let id = claim.id.clone();
        store.insert(claim).await.unwrap();

        let actor = UserId::new();
        store
            .try_acquire_lock(&id, &actor, Duration::minutes(5))
            .await
            .unwrap();

        // a different actor cannot finalize someone else's processing run
        assert!(store.mark_paid(&id, &UserId::new()).await.is_err());

        let paid = store.mark_paid(&id, &actor).await.unwrap();
        assert_eq!(paid.status, ClaimStatus::Paid);
        assert!(paid.processed_at.is_some());
        assert!(paid.locked_by.is_none());
    }

    #[tokio::test]
    async fn release_returns_claim_to_approved() {
        let store = InMemoryClaimStore::new();
        let claim = approved_claim();
        let id = claim.id.clone();
        store.insert(claim).await.unwrap();

        store
            .try_acquire_lock(&id, &UserId::new(), Duration::minutes(5))
            .await
            .unwrap();
        let released = store.release_lock(&id).await.unwrap();
        assert_eq!(released.status, ClaimStatus::Approved);
        assert!(released.locked_at.is_none());

        // retryable: a new actor can lock again
        assert!(store
            .try_acquire_lock(&id, &UserId::new(), Duration::minutes(5))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn rejection_is_terminal() {
        let store = InMemoryClaimStore::new();
        let mut claim = approved_claim();
        claim.status = ClaimStatus::UnderReview;
        let id = claim.id.clone();
        store.insert(claim).await.unwrap();

        let rejected = store
            .mark_rejected(&id, vec!["no snapshot".to_string()])
            .await
            .unwrap();
        assert_eq!(rejected.status, ClaimStatus::Rejected);
        assert_eq!(rejected.rejection_reasons, vec!["no snapshot".to_string()]);

        assert!(store.transition(&id, ClaimStatus::Approved).await.is_err());
    }

    #[tokio::test]
    async fn operator_rejection_cannot_preempt_a_live_processor() {
        let store = InMemoryClaimStore::new();
        let claim = approved_claim();
        let id = claim.id.clone();
        store.insert(claim).await.unwrap();

        let actor = UserId::new();
        store
            .try_acquire_lock(&id, &actor, Duration::minutes(5))
            .await
            .unwrap();

        let err = store
            .reject_review(&id, vec!["operator override".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LendaroError::InvalidTransition { .. }));

        // the settlement path itself may still reject its own claim
        let rejected = store
            .mark_rejected(&id, vec!["ineligible".to_string()])
            .await
            .unwrap();
        assert_eq!(rejected.status, ClaimStatus::Rejected);
    }

    #[tokio::test]
    async fn operator_rejection_before_settlement() {
        let store = InMemoryClaimStore::new();
        let mut claim = approved_claim();
        claim.status = ClaimStatus::Submitted;
        let id = claim.id.clone();
        store.insert(claim).await.unwrap();

        let rejected = store
            .reject_review(&id, vec!["insufficient evidence".to_string()])
            .await
            .unwrap();
        assert_eq!(rejected.status, ClaimStatus::Rejected);
        assert_eq!(
            rejected.rejection_reasons,
            vec!["insufficient evidence".to_string()]
        );
    }
}
