//! # Persistence Errors
//!
//! Error types cho persistence layer, wrapping sqlx và IO errors.

use std::fmt;
use thiserror::Error;

/// Unique constraint nào bị vi phạm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    /// `UNIQUE (kind, email)` trên identities
    IdentityEmail,
    /// Primary key của identities
    IdentityId,
    /// `UNIQUE (customer_id, transaction_id)` - idempotency token
    TransactionId,
}

impl UniqueKey {
    /// Phân loại từ message SQLite, e.g.
    /// "UNIQUE constraint failed: identities.kind, identities.email"
    pub fn from_sqlite_message(message: &str) -> Option<Self> {
        if message.contains("identities.email") {
            Some(Self::IdentityEmail)
        } else if message.contains("identities.id") {
            Some(Self::IdentityId)
        } else if message.contains("transactions.transaction_id") {
            Some(Self::TransactionId)
        } else {
            None
        }
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IdentityEmail => "identity email",
            Self::IdentityId => "identity id",
            Self::TransactionId => "transaction id",
        };
        f.write_str(name)
    }
}

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    // === Database errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violation on {key}: {detail}")]
    UniqueViolation { key: UniqueKey, detail: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    // === Journal errors ===
    #[error("Journal IO error: {0}")]
    JournalIo(#[from] std::io::Error),

    #[error("Journal serialization error: {0}")]
    JournalSerialization(#[from] serde_json::Error),

    // === Conversion errors ===
    #[error("Invalid decimal value: {0}")]
    InvalidDecimal(String),

    #[error("Invalid enum value: {field} = {value}")]
    InvalidEnumValue { field: String, value: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias cho PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl PersistenceError {
    /// Tạo NotFound error
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn unique(key: UniqueKey, detail: impl Into<String>) -> Self {
        Self::UniqueViolation {
            key,
            detail: detail.into(),
        }
    }

    /// Kiểm tra có phải lỗi not found không
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Kiểm tra có phải unique violation không (kể cả từ SQLite)
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::UniqueViolation { .. } => true,
            Self::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Constraint bị vi phạm, nếu xác định được
    pub fn unique_key(&self) -> Option<UniqueKey> {
        match self {
            Self::UniqueViolation { key, .. } => Some(*key),
            Self::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                UniqueKey::from_sqlite_message(db.message())
            }
            _ => None,
        }
    }

    /// Lỗi giao tiếp với store (IO, pool, timeout) - caller không nên retry mù
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_)
                | Self::Database(
                    sqlx::Error::Io(_)
                        | sqlx::Error::PoolTimedOut
                        | sqlx::Error::PoolClosed
                        | sqlx::Error::WorkerCrashed
                )
        )
    }
}
