//! # Error Module
//!
//! Domain errors cho loyalty ledger sử dụng thiserror.

use thiserror::Error;

/// Core domain errors.
///
/// Các lỗi nghiệp vụ cốt lõi, không liên quan đến infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // === Amount / points errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: need {needed}, available {available}")]
    InsufficientBalance { needed: i64, available: i64 },

    #[error("Points balance overflow")]
    BalanceOverflow,

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Unknown operation kind: {0}")]
    UnknownOperationKind(String),

    // === Identity errors ===
    #[error("Unknown identity kind: {0}")]
    UnknownIdentityKind(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    // === Credential errors ===
    #[error("Invalid PIN format: {0}")]
    InvalidPinFormat(String),

    #[error("Credential hashing failed: {0}")]
    Credential(String),
}

/// Result type alias với CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Kiểm tra có phải lỗi insufficient balance không
    pub fn is_insufficient_balance(&self) -> bool {
        matches!(self, CoreError::InsufficientBalance { .. })
    }

    /// Kiểm tra có phải lỗi input từ caller không (amount, email, PIN format)
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidAmount(_)
                | CoreError::InvalidEmail(_)
                | CoreError::InvalidName(_)
                | CoreError::InvalidPinFormat(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InsufficientBalance {
            needed: 10,
            available: 5,
        };
        assert_eq!(err.to_string(), "Insufficient balance: need 10, available 5");

        let err = CoreError::InvalidAmount("abc".to_string());
        assert_eq!(err.to_string(), "Invalid amount: abc");
    }

    #[test]
    fn test_error_checks() {
        let err = CoreError::InsufficientBalance {
            needed: 1,
            available: 0,
        };
        assert!(err.is_insufficient_balance());
        assert!(!err.is_validation_error());

        assert!(CoreError::InvalidPinFormat("12".to_string()).is_validation_error());
        assert!(!CoreError::BalanceOverflow.is_validation_error());
    }
}
