//! Error taxonomy for the marketplace core
//!
//! Error codes are stable strings used in API responses. All variants
//! except `Storage` are client-visible, non-retryable rejections.

use thiserror::Error;

/// Marketplace core errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    // === Lookup ===
    #[error("Session not found: {0}")]
    SessionNotFound(u64),

    #[error("Dispute not found: {0}")]
    DisputeNotFound(u64),

    #[error("User not found: {0}")]
    UserNotFound(u64),

    // === Authorization ===
    #[error("Actor is not a participant of this session")]
    Unauthorized,

    #[error("Action requires the {0} role")]
    WrongRole(&'static str),

    // === Validation ===
    #[error("Requester and provider cannot be the same user")]
    SameParty,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Rating must be between 1 and 5 stars")]
    InvalidRating,

    // === State machine ===
    #[error("Illegal transition: cannot {action} while {status}")]
    StateViolation {
        status: &'static str,
        action: &'static str,
    },

    #[error("Already actioned: {0}")]
    AlreadyActioned(&'static str),

    // === Ledger ===
    #[error("Insufficient balance")]
    InsufficientFunds,

    #[error("Withdrawal below minimum")]
    BelowMinimumWithdrawal,

    // === System ===
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            CoreError::DisputeNotFound(_) => "DISPUTE_NOT_FOUND",
            CoreError::UserNotFound(_) => "USER_NOT_FOUND",
            CoreError::Unauthorized => "UNAUTHORIZED",
            CoreError::WrongRole(_) => "WRONG_ROLE",
            CoreError::SameParty => "SAME_PARTY",
            CoreError::InvalidAmount => "INVALID_AMOUNT",
            CoreError::InvalidRating => "INVALID_RATING",
            CoreError::StateViolation { .. } => "STATE_VIOLATION",
            CoreError::AlreadyActioned(_) => "ALREADY_ACTIONED",
            CoreError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            CoreError::BelowMinimumWithdrawal => "BELOW_MINIMUM_WITHDRAWAL",
            CoreError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::SessionNotFound(_)
            | CoreError::DisputeNotFound(_)
            | CoreError::UserNotFound(_) => 404,
            CoreError::Unauthorized | CoreError::WrongRole(_) => 403,
            CoreError::SameParty | CoreError::InvalidAmount | CoreError::InvalidRating => 400,
            CoreError::StateViolation { .. } | CoreError::AlreadyActioned(_) => 409,
            CoreError::InsufficientFunds | CoreError::BelowMinimumWithdrawal => 422,
            CoreError::Storage(_) => 503,
        }
    }

    /// Whether a caller may safely retry the identical request.
    ///
    /// Only transient storage failures qualify; silent retry of any
    /// money-movement rejection risks double-application.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CoreError::SameParty.code(), "SAME_PARTY");
        assert_eq!(CoreError::InsufficientFunds.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(
            CoreError::AlreadyActioned("escrow already locked").code(),
            "ALREADY_ACTIONED"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(CoreError::Unauthorized.http_status(), 403);
        assert_eq!(CoreError::SessionNotFound(7).http_status(), 404);
        assert_eq!(CoreError::InvalidAmount.http_status(), 400);
        assert_eq!(
            CoreError::StateViolation {
                status: "pending",
                action: "start"
            }
            .http_status(),
            409
        );
        assert_eq!(CoreError::InsufficientFunds.http_status(), 422);
        assert_eq!(CoreError::Storage("test".into()).http_status(), 503);
    }

    #[test]
    fn test_retryable() {
        assert!(CoreError::Storage("io".into()).is_retryable());
        assert!(!CoreError::InsufficientFunds.is_retryable());
        assert!(!CoreError::AlreadyActioned("paid").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = CoreError::StateViolation {
            status: "pending",
            action: "start",
        };
        assert_eq!(
            err.to_string(),
            "Illegal transition: cannot start while pending"
        );
    }
}
