//! Error types for the settlement engine
//!
//! One explicit taxonomy, matched exhaustively at call sites. The
//! per-caller failure policy (fail-open fraud validation, fail-to-zero
//! waterfall stages, log-for-reconciliation fund writes) lives at the call
//! sites, not here; this enum only names what went wrong.

use thiserror::Error;

/// Result type for Lendaro operations
pub type Result<T> = std::result::Result<T, LendaroError>;

/// Lendaro error types
#[derive(Debug, Clone, Error)]
pub enum LendaroError {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// Malformed or missing input, rejected before any state change
    #[error("Invalid input: {field} - {reason}")]
    Validation { field: String, reason: String },

    /// Amount overflow during arithmetic
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    /// Amount underflow during arithmetic
    #[error("Amount underflow during arithmetic operation")]
    AmountUnderflow,

    // ========================================================================
    // Not-Found Errors (distinct from "zero eligible")
    // ========================================================================

    /// No risk snapshot exists for the booking
    #[error("No risk snapshot for booking {booking_id}")]
    SnapshotNotFound { booking_id: String },

    /// A risk snapshot already exists for the booking
    #[error("Risk snapshot already exists for booking {booking_id}")]
    SnapshotExists { booking_id: String },

    /// Claim not found
    #[error("Claim {claim_id} not found")]
    ClaimNotFound { claim_id: String },

    // ========================================================================
    // Concurrency Errors
    // ========================================================================

    /// Lock acquisition lost to a concurrent processor; retryable later
    #[error("Claim {claim_id} is already being processed")]
    ClaimLocked { claim_id: String },

    /// Status transition not allowed by the claim state machine
    #[error("Claim {claim_id}: cannot transition from {from} to {to}")]
    InvalidTransition {
        claim_id: String,
        from: String,
        to: String,
    },

    // ========================================================================
    // Fraud Gating
    // ========================================================================

    /// Hard stop from anti-fraud gating; the claim was never persisted.
    /// Non-blocking findings are warnings attached to the claim instead.
    #[error("Claim creation blocked by anti-fraud rules: {}", rules.join(", "))]
    FraudBlocked { rules: Vec<String> },

    /// Check-in/check-out inspections not validated complete
    #[error("Inspections incomplete for booking {booking_id}: missing {}", missing.join(", "))]
    InspectionIncomplete {
        booking_id: String,
        missing: Vec<String>,
    },

    // ========================================================================
    // External Service Errors
    // ========================================================================

    /// Payment gateway failure
    #[error("Payment gateway error: {reason}")]
    GatewayError { reason: String },

    /// Wallet ledger failure
    #[error("Wallet ledger error: {reason}")]
    WalletError { reason: String },

    /// Damage classifier failure
    #[error("Damage classifier error: {reason}")]
    ClassifierError { reason: String },

    /// Anti-fraud validator infrastructure failure (callers fail open)
    #[error("Fraud validator unavailable: {reason}")]
    FraudValidatorUnavailable { reason: String },

    // ========================================================================
    // Fund Errors
    // ========================================================================

    /// A payout would drive the liquidity sub-account negative
    #[error("Insufficient {sub_account} balance: have {available}, need {requested}")]
    InsufficientFunds {
        sub_account: String,
        available: u64,
        requested: u64,
    },

    // ========================================================================
    // Security Errors
    // ========================================================================

    /// Unauthorized action
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LendaroError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Whether the caller may usefully retry later
    ///
    /// A lost claim lock is retryable once the lock releases or goes
    /// stale; external outages are retryable by nature. Validation and
    /// fraud blocks are not.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::ClaimLocked { .. }
                | Self::GatewayError { .. }
                | Self::WalletError { .. }
                | Self::ClassifierError { .. }
                | Self::FraudValidatorUnavailable { .. }
                | Self::Internal { .. }
        )
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::AmountUnderflow => "AMOUNT_UNDERFLOW",
            Self::SnapshotNotFound { .. } => "SNAPSHOT_NOT_FOUND",
            Self::SnapshotExists { .. } => "SNAPSHOT_EXISTS",
            Self::ClaimNotFound { .. } => "CLAIM_NOT_FOUND",
            Self::ClaimLocked { .. } => "CLAIM_LOCKED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::FraudBlocked { .. } => "FRAUD_BLOCKED",
            Self::InspectionIncomplete { .. } => "INSPECTION_INCOMPLETE",
            Self::GatewayError { .. } => "GATEWAY_ERROR",
            Self::WalletError { .. } => "WALLET_ERROR",
            Self::ClassifierError { .. } => "CLASSIFIER_ERROR",
            Self::FraudValidatorUnavailable { .. } => "FRAUD_VALIDATOR_UNAVAILABLE",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        let err = LendaroError::ClaimLocked {
            claim_id: "clm_x".to_string(),
        };
        assert_eq!(err.error_code(), "CLAIM_LOCKED");
    }

    #[test]
    fn retriable_errors() {
        assert!(LendaroError::ClaimLocked {
            claim_id: "clm_x".to_string()
        }
        .is_retriable());

        assert!(!LendaroError::FraudBlocked {
            rules: vec!["claim_velocity".to_string()]
        }
        .is_retriable());

        assert!(!LendaroError::validation("amount", "negative").is_retriable());
    }
}
