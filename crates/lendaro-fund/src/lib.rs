//! Lendaro Fund - Append-only guarantee fund ledger
//!
//! The ledger is:
//! - Split across three sub-accounts (liquidity, capitalization,
//!   profitability)
//! - Immutable (movements are append-only, never updated or deleted)
//! - Derived (balances are always summed from movements, never cached)
//!
//! # Invariants
//!
//! 1. The liquidity balance never goes negative: every debit is checked
//!    against the derived balance inside the same write section
//! 2. A transfer commits both legs or neither
//! 3. Every admin-initiated movement carries a reason and an admin id

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lendaro_types::{
    AdminId, Amount, BookingId, ClaimId, CountryCode, EntryKind, FundMovement, LendaroError,
    MovementDirection, MovementId, Result, RiskBucket, SubAccount,
};
use tokio::sync::RwLock;
use tracing::info;

/// Inputs for a claim payout movement written by the waterfall executor
#[derive(Debug, Clone)]
pub struct PayoutParams {
    pub amount: Amount,
    pub country: CountryCode,
    pub bucket: RiskBucket,
    pub booking_id: BookingId,
    pub claim_id: ClaimId,
    pub fx_rate: f64,
    pub solvency_ratio: f64,
}

/// The guarantee fund ledger
///
/// Thread-safe; concurrent payouts for different claims are safe because
/// every negative-balance check runs atomically against the movement log
/// under the single write lock.
#[derive(Clone)]
pub struct FundLedger {
    movements: Arc<RwLock<Vec<FundMovement>>>,
    admins: Arc<HashSet<AdminId>>,
}

impl FundLedger {
    /// Create an empty ledger with the given privileged operators
    pub fn new(admins: impl IntoIterator<Item = AdminId>) -> Self {
        Self {
            movements: Arc::new(RwLock::new(Vec::new())),
            admins: Arc::new(admins.into_iter().collect()),
        }
    }

    fn authorize(&self, admin: &AdminId) -> Result<()> {
        if self.admins.contains(admin) {
            Ok(())
        } else {
            Err(LendaroError::unauthorized(format!(
                "{} is not a fund operator",
                admin
            )))
        }
    }

    fn balance_of(movements: &[FundMovement], sub_account: SubAccount) -> i128 {
        movements
            .iter()
            .filter(|m| m.sub_account == sub_account)
            .map(|m| m.signed_amount())
            .sum()
    }

    /// Append a movement, enforcing the no-negative-balance invariant for
    /// debits before anything is written
    async fn append_checked(&self, movement: FundMovement) -> Result<MovementId> {
        let mut movements = self.movements.write().await;

        if movement.entry == EntryKind::Debit {
            let balance = Self::balance_of(&movements, movement.sub_account);
            if balance < movement.amount.0 as i128 {
                return Err(LendaroError::InsufficientFunds {
                    sub_account: movement.sub_account.as_str().to_string(),
                    available: balance.max(0) as u64,
                    requested: movement.amount.0,
                });
            }
        }

        let id = movement.id.clone();
        info!(
            movement = %id,
            sub_account = %movement.sub_account,
            direction = movement.direction.as_str(),
            amount = %movement.amount,
            "fund movement appended"
        );
        movements.push(movement);
        Ok(id)
    }

    /// Record a booking-fee contribution into a sub-account
    pub async fn contribute(
        &self,
        sub_account: SubAccount,
        amount: Amount,
        country: CountryCode,
        bucket: RiskBucket,
        booking_id: Option<BookingId>,
        reason: impl Into<String>,
    ) -> Result<MovementId> {
        self.append_checked(FundMovement {
            id: MovementId::new(),
            sub_account,
            entry: EntryKind::Credit,
            direction: MovementDirection::Contribution,
            amount,
            country,
            bucket,
            booking_id,
            claim_id: None,
            fx_rate: None,
            solvency_ratio: None,
            reason: reason.into(),
            admin_id: None,
            created_at: Utc::now(),
        })
        .await
    }

    /// Record a claim payout from the liquidity sub-account
    ///
    /// Fails without writing anything if liquidity would go negative.
    pub async fn payout(&self, params: PayoutParams) -> Result<MovementId> {
        self.append_checked(FundMovement {
            id: MovementId::new(),
            sub_account: SubAccount::Liquidity,
            entry: EntryKind::Debit,
            direction: MovementDirection::Payout,
            amount: params.amount,
            country: params.country,
            bucket: params.bucket,
            booking_id: Some(params.booking_id),
            claim_id: Some(params.claim_id),
            fx_rate: Some(params.fx_rate),
            solvency_ratio: Some(params.solvency_ratio),
            reason: "claim settlement payout".to_string(),
            admin_id: None,
            created_at: Utc::now(),
        })
        .await
    }

    /// Record an amount recovered after a settled loss
    pub async fn record_recovery(
        &self,
        amount: Amount,
        country: CountryCode,
        bucket: RiskBucket,
        claim_id: ClaimId,
        reason: impl Into<String>,
    ) -> Result<MovementId> {
        self.append_checked(FundMovement {
            id: MovementId::new(),
            sub_account: SubAccount::Liquidity,
            entry: EntryKind::Credit,
            direction: MovementDirection::Recovery,
            amount,
            country,
            bucket,
            booking_id: None,
            claim_id: Some(claim_id),
            fx_rate: None,
            solvency_ratio: None,
            reason: reason.into(),
            admin_id: None,
            created_at: Utc::now(),
        })
        .await
    }

    /// Move balance between sub-accounts under explicit authorization
    ///
    /// Both legs commit together or not at all: the source balance check
    /// and both inserts happen under one write section.
    pub async fn transfer(
        &self,
        from: SubAccount,
        to: SubAccount,
        amount: Amount,
        country: CountryCode,
        bucket: RiskBucket,
        reason: impl Into<String>,
        admin: &AdminId,
    ) -> Result<(MovementId, MovementId)> {
        self.authorize(admin)?;
        if from == to {
            return Err(LendaroError::validation(
                "to",
                "transfer source and destination must differ",
            ));
        }
        if amount.is_zero() {
            return Err(LendaroError::validation("amount", "transfer amount must be positive"));
        }
        let reason = reason.into();

        let mut movements = self.movements.write().await;
        let balance = Self::balance_of(&movements, from);
        if balance < amount.0 as i128 {
            return Err(LendaroError::InsufficientFunds {
                sub_account: from.as_str().to_string(),
                available: balance.max(0) as u64,
                requested: amount.0,
            });
        }

        let now = Utc::now();
        let leg = |sub_account: SubAccount, entry: EntryKind| FundMovement {
            id: MovementId::new(),
            sub_account,
            entry,
            direction: MovementDirection::Transfer,
            amount,
            country: country.clone(),
            bucket,
            booking_id: None,
            claim_id: None,
            fx_rate: None,
            solvency_ratio: None,
            reason: reason.clone(),
            admin_id: Some(admin.0.clone()),
            created_at: now,
        };

        let debit = leg(from, EntryKind::Debit);
        let credit = leg(to, EntryKind::Credit);
        let ids = (debit.id.clone(), credit.id.clone());
        info!(
            admin = %admin,
            from = %from,
            to = %to,
            amount = %amount,
            "fund transfer"
        );
        movements.push(debit);
        movements.push(credit);
        Ok(ids)
    }

    /// Privileged manual payout, producing a movement with a reason
    pub async fn direct_payout(
        &self,
        sub_account: SubAccount,
        amount: Amount,
        country: CountryCode,
        bucket: RiskBucket,
        reason: impl Into<String>,
        admin: &AdminId,
    ) -> Result<MovementId> {
        self.authorize(admin)?;
        if amount.is_zero() {
            return Err(LendaroError::validation("amount", "payout amount must be positive"));
        }
        self.append_checked(FundMovement {
            id: MovementId::new(),
            sub_account,
            entry: EntryKind::Debit,
            direction: MovementDirection::Payout,
            amount,
            country,
            bucket,
            booking_id: None,
            claim_id: None,
            fx_rate: None,
            solvency_ratio: None,
            reason: reason.into(),
            admin_id: Some(admin.0.clone()),
            created_at: Utc::now(),
        })
        .await
    }

    /// Derived balance of a sub-account
    ///
    /// Non-negative by construction: all debits are checked at write time.
    pub async fn balance(&self, sub_account: SubAccount) -> Amount {
        let movements = self.movements.read().await;
        Amount(Self::balance_of(&movements, sub_account).max(0) as u64)
    }

    /// Derived liquidity balance for one country/bucket segment
    pub async fn segment_balance(&self, country: &CountryCode, bucket: RiskBucket) -> Amount {
        let movements = self.movements.read().await;
        let sum: i128 = movements
            .iter()
            .filter(|m| {
                m.sub_account == SubAccount::Liquidity
                    && &m.country == country
                    && m.bucket == bucket
            })
            .map(|m| m.signed_amount())
            .sum();
        Amount(sum.max(0) as u64)
    }

    /// Movements for one country/bucket segment since a point in time
    pub async fn segment_movements_since(
        &self,
        country: &CountryCode,
        bucket: RiskBucket,
        since: DateTime<Utc>,
    ) -> Vec<FundMovement> {
        let movements = self.movements.read().await;
        movements
            .iter()
            .filter(|m| &m.country == country && m.bucket == bucket && m.created_at >= since)
            .cloned()
            .collect()
    }

    /// Movements linked to a claim
    pub async fn movements_for_claim(&self, claim_id: &ClaimId) -> Vec<FundMovement> {
        let movements = self.movements.read().await;
        movements
            .iter()
            .filter(|m| m.claim_id.as_ref() == Some(claim_id))
            .cloned()
            .collect()
    }

    /// Total number of movements
    pub async fn movement_count(&self) -> usize {
        self.movements.read().await.len()
    }
}
