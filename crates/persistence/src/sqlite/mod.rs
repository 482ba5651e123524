//! SQLite persistence module
//!
//! Repository pattern cho SQLite database access, cộng với
//! [`SqliteLedgerStore`] implement [`crate::LedgerStore`].

pub mod repos;
pub mod schema;
pub mod store;

pub use repos::{IdentityRepo, TransactionRepo};
pub use schema::{create_schema, IdentityRow, TransactionRow};
pub use store::SqliteLedgerStore;
