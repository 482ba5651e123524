//! Business layer errors
//!
//! One taxonomy for every service operation. Lower-layer errors are
//! classified here so callers never see driver or IO details.

use loyalty_core::CoreError;
use loyalty_persistence::{PersistenceError, UniqueKey};
use thiserror::Error;

/// Loyalty service errors
#[derive(Debug, Error)]
pub enum LoyaltyError {
    // === Lookup errors ===
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    // === Credential errors ===
    #[error("Invalid PIN")]
    InvalidPin,

    #[error("Invalid PIN format: {0}")]
    InvalidPinFormat(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // === Validation errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: need {needed}, available {available}")]
    InsufficientBalance { needed: i64, available: i64 },

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // === Store errors ===
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Append conflict for customer {customer_id} after {attempts} attempts")]
    Conflict { customer_id: String, attempts: u32 },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for business operations
pub type LoyaltyResult<T> = Result<T, LoyaltyError>;

impl LoyaltyError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    pub fn customer_not_found(id: &str) -> Self {
        Self::not_found("Customer", id)
    }

    pub fn admin_not_found(id: &str) -> Self {
        Self::not_found("Administrator", id)
    }

    /// Short message safe to show an operator
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { kind, .. } => format!("{} not found.", kind),
            Self::InvalidPin => "Incorrect PIN.".to_string(),
            Self::InvalidPinFormat(detail) => format!("Invalid PIN: {}.", detail),
            Self::Unauthorized(_) => "This operation needs an administrator.".to_string(),
            Self::InvalidAmount(_) => "Please enter a valid positive amount.".to_string(),
            Self::InsufficientBalance { needed, available } => format!(
                "Not enough points: {} needed, {} available.",
                needed, available
            ),
            Self::DuplicateEmail(_) => "This email is already registered.".to_string(),
            Self::InvalidEmail(_) => "Please enter a valid email address.".to_string(),
            Self::InvalidInput(detail) => format!("Invalid input: {}.", detail),
            Self::StoreUnavailable(_) => {
                "The ledger is unreachable right now. Please try again.".to_string()
            }
            Self::Conflict { .. } => {
                "The ledger is busy for this customer. Please try again.".to_string()
            }
            Self::Configuration(_) => "The service is misconfigured.".to_string(),
        }
    }

    /// Safe to retry with the same idempotency token
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Conflict { .. })
    }

    /// Caller supplied bad input
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::InvalidEmail(_)
                | Self::InvalidPinFormat(_)
                | Self::InvalidInput(_)
        )
    }

    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::InvalidPin | Self::Unauthorized(_))
    }
}

impl From<CoreError> for LoyaltyError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidAmount(msg) | CoreError::InvalidTransaction(msg) => {
                Self::InvalidAmount(msg)
            }
            CoreError::InsufficientBalance { needed, available } => {
                Self::InsufficientBalance { needed, available }
            }
            CoreError::BalanceOverflow => Self::InvalidAmount("points balance overflow".to_string()),
            CoreError::InvalidEmail(msg) => Self::InvalidEmail(msg),
            CoreError::InvalidPinFormat(msg) => Self::InvalidPinFormat(msg),
            CoreError::InvalidName(msg)
            | CoreError::UnknownOperationKind(msg)
            | CoreError::UnknownIdentityKind(msg) => Self::InvalidInput(msg),
            CoreError::Credential(msg) => Self::Configuration(msg),
        }
    }
}

impl From<PersistenceError> for LoyaltyError {
    fn from(err: PersistenceError) -> Self {
        match err.unique_key() {
            Some(UniqueKey::IdentityEmail) => return Self::DuplicateEmail(err.to_string()),
            Some(UniqueKey::IdentityId) => {
                return Self::InvalidInput("identity id already exists".to_string())
            }
            Some(UniqueKey::TransactionId) => {
                return Self::InvalidInput("transaction id already used".to_string())
            }
            None => {}
        }
        match err {
            PersistenceError::NotFound { entity, id } => Self::NotFound { kind: entity, id },
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_message() {
        let err = LoyaltyError::InsufficientBalance {
            needed: 6,
            available: 5,
        };
        assert!(err.to_string().contains("need 6"));
        assert_eq!(err.user_message(), "Not enough points: 6 needed, 5 available.");
    }

    #[test]
    fn test_core_error_mapping() {
        let err: LoyaltyError = CoreError::InvalidAmount("abc".to_string()).into();
        assert!(matches!(err, LoyaltyError::InvalidAmount(_)));
        assert!(err.is_validation_error());

        let err: LoyaltyError = CoreError::InsufficientBalance {
            needed: 2,
            available: 1,
        }
        .into();
        assert!(matches!(err, LoyaltyError::InsufficientBalance { needed: 2, available: 1 }));
    }

    #[test]
    fn test_persistence_error_mapping() {
        let err: LoyaltyError =
            PersistenceError::unique(UniqueKey::IdentityEmail, "customer email a@b.co").into();
        assert!(matches!(err, LoyaltyError::DuplicateEmail(_)));

        let err: LoyaltyError = PersistenceError::unique(UniqueKey::IdentityId, "C1").into();
        assert!(matches!(err, LoyaltyError::InvalidInput(_)));

        let err: LoyaltyError =
            PersistenceError::unique(UniqueKey::TransactionId, "till-7-0001").into();
        assert!(matches!(err, LoyaltyError::InvalidInput(_)));

        let err: LoyaltyError = PersistenceError::not_found("customer", "C1").into();
        assert!(matches!(err, LoyaltyError::NotFound { .. }));

        let err: LoyaltyError = PersistenceError::Unavailable("connection reset".to_string()).into();
        assert!(matches!(err, LoyaltyError::StoreUnavailable(_)));
        assert!(err.is_retryable());
        assert!(!err.user_message().contains("connection reset"));
    }

    #[test]
    fn test_pin_message_is_generic() {
        let err = LoyaltyError::InvalidPin;
        assert!(err.is_credential_error());
        assert!(!err.is_retryable());
        assert_eq!(err.user_message(), "Incorrect PIN.");
    }
}
