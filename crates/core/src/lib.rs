//! # Loyalty Core
//!
//! Domain types cho loyalty-points ledger - không có I/O.
//!
//! - [`Identity`]: Customer hoặc Administrator (id, name, email, PIN digest)
//! - [`Transaction`]: một ledger event bất biến với `resulting_balance`
//! - [`derive_balance`]: balance hiện tại = `resulting_balance` của entry cuối cùng
//! - [`CredentialVerifier`]: hash/verify PIN
//! - [`LedgerEvent`]: audit event cho JSONL journal

pub mod balance;
pub mod credential;
pub mod error;
pub mod event;
pub mod identity;
pub mod points;
pub mod transaction;

pub use balance::{derive_balance, reconcile, BalanceView, Divergence, ReconciliationReport};
pub use credential::{
    digests_match, validate_pin_format, CredentialVerifier, PinDigest, PinHasher, PinScheme,
    Pbkdf2PinHasher, Sha256PinHasher,
};
pub use error::{CoreError, CoreResult};
pub use event::{EventType, LedgerEvent};
pub use identity::{normalize_email, validate_email, Identity, IdentityField, IdentityKind};
pub use points::{parse_amount, PointsPolicy};
pub use transaction::{LedgerEntry, OperationKind, PointsEntry, Transaction, TransactionKey};
