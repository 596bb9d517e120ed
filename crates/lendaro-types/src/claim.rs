//! Claim and damage types
//!
//! The claim status machine is monotonic with one exception: a failure
//! during waterfall execution rolls `processing` back to `approved` so the
//! claim can be retried under a fresh lock.

use crate::{Amount, BookingId, ClaimId, LendaroError, Result, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of reported damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageType {
    Scratch,
    Dent,
    Breakage,
    MissingPart,
    Stain,
    Mechanical,
    Other,
}

/// Severity of a damage item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
}

/// A single reported damage on a returned asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageItem {
    pub damage_type: DamageType,
    pub description: String,
    pub severity: Severity,
    pub estimated_cost: Amount,
    /// References to uploaded evidence (image ids, inspection photo ids)
    pub evidence: Vec<String>,
}

/// Claim lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Processing,
    Paid,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Draft => "draft",
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::UnderReview => "under_review",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Processing => "processing",
            ClaimStatus::Paid => "paid",
            ClaimStatus::Rejected => "rejected",
        }
    }

    /// Paid and rejected are terminal; no lock survives a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Paid | ClaimStatus::Rejected)
    }

    /// Allowed forward transitions of the state machine
    ///
    /// `Processing -> Approved` is the rollback path after a failed
    /// waterfall execution. `Processing -> {Paid, Rejected}` and lock
    /// acquisition (`Approved -> Processing`) go through dedicated store
    /// operations, not this table.
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        matches!(
            (self, next),
            (ClaimStatus::Draft, ClaimStatus::Submitted)
                | (ClaimStatus::Submitted, ClaimStatus::UnderReview)
                | (ClaimStatus::Submitted, ClaimStatus::Rejected)
                | (ClaimStatus::UnderReview, ClaimStatus::Approved)
                | (ClaimStatus::UnderReview, ClaimStatus::Rejected)
                | (ClaimStatus::Processing, ClaimStatus::Approved)
        )
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Non-blocking anti-fraud finding attached to a claim for manual review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudWarning {
    pub rule: String,
    pub detail: String,
}

/// A reported loss against a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub booking_id: BookingId,
    pub reporter: UserId,
    pub items: Vec<DamageItem>,
    /// Always recomputed from `items`, never trusted from the caller
    pub total_estimated: Amount,
    pub status: ClaimStatus,
    pub notes: Option<String>,
    /// Anti-fraud warnings recorded at creation time
    pub warnings: Vec<FraudWarning>,
    /// Populated when the claim reaches `Rejected`
    pub rejection_reasons: Vec<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<UserId>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// Build a new draft claim, recomputing the total from the items
    pub fn new(
        booking_id: BookingId,
        reporter: UserId,
        items: Vec<DamageItem>,
        notes: Option<String>,
    ) -> Result<Self> {
        let total_estimated = Self::total_of(&items)?;
        let now = Utc::now();
        Ok(Self {
            id: ClaimId::new(),
            booking_id,
            reporter,
            items,
            total_estimated,
            status: ClaimStatus::Draft,
            notes,
            warnings: Vec::new(),
            rejection_reasons: Vec::new(),
            locked_at: None,
            locked_by: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sum of item costs, overflow-checked
    pub fn total_of(items: &[DamageItem]) -> Result<Amount> {
        items
            .iter()
            .try_fold(Amount::ZERO, |acc, item| acc.checked_add(item.estimated_cost))
    }

    /// Age of the current lock, if any
    pub fn lock_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.locked_at.map(|at| now - at)
    }

    /// Whether the lock may be taken over at `now` given a staleness window
    pub fn lock_is_stale(&self, now: DateTime<Utc>, staleness: chrono::Duration) -> bool {
        match self.lock_age(now) {
            Some(age) => age > staleness,
            None => true,
        }
    }
}

impl LendaroError {
    /// Helper for transition violations
    pub fn invalid_transition(claim_id: &ClaimId, from: ClaimStatus, to: ClaimStatus) -> Self {
        Self::InvalidTransition {
            claim_id: claim_id.0.clone(),
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }
}
