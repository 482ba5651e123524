//! # Loyalty Persistence
//!
//! Persistence layer cho loyalty ledger - ledger store + JSONL audit journal.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Database                          │
//! │  ┌──────────────────────────┐    ┌───────────────────┐  │
//! │  │  dyn LedgerStore         │    │   AuditJournal    │  │
//! │  │  (SQLite | in-memory)    │    │   (JSONL)         │  │
//! │  └──────────────────────────┘    └───────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loyalty_persistence::Database;
//!
//! let db = Database::open("sqlite:loyalty.db", "data/journal", timeout).await?;
//! let last = db.store().last_transaction(&customer_id).await?;
//! db.journal().append(&event)?;
//! ```

pub mod error;
pub mod journal;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{PersistenceError, PersistenceResult, UniqueKey};
pub use journal::{AuditJournal, JournalFilter, JournalReader};
pub use memory::MemoryLedgerStore;
pub use sqlite::{IdentityRepo, SqliteLedgerStore, TransactionRepo};
pub use store::{AppendCondition, AppendOutcome, LedgerStore};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Database facade - store + journal
pub struct Database {
    store: Arc<dyn LedgerStore>,
    journal: Arc<AuditJournal>,
}

impl Database {
    /// Mở SQLite store và journal
    ///
    /// # Arguments
    /// * `db_url` - SQLite database URL (e.g., "sqlite:loyalty.db")
    /// * `journal_path` - Thư mục chứa JSONL journal
    /// * `timeout` - timeout lấy connection
    pub async fn open<P: AsRef<Path>>(
        db_url: &str,
        journal_path: P,
        timeout: Duration,
    ) -> PersistenceResult<Self> {
        let store = SqliteLedgerStore::connect(db_url, timeout).await?;
        let journal = AuditJournal::new(journal_path)?;
        Ok(Self {
            store: Arc::new(store),
            journal: Arc::new(journal),
        })
    }

    /// Dùng store bất kỳ (e.g. [`MemoryLedgerStore`])
    pub fn with_store<P: AsRef<Path>>(
        store: Arc<dyn LedgerStore>,
        journal_path: P,
    ) -> PersistenceResult<Self> {
        Ok(Self {
            store,
            journal: Arc::new(AuditJournal::new(journal_path)?),
        })
    }

    pub fn store(&self) -> Arc<dyn LedgerStore> {
        Arc::clone(&self.store)
    }

    pub fn journal(&self) -> Arc<AuditJournal> {
        Arc::clone(&self.journal)
    }

    /// Reader cho audit/replay
    pub fn journal_reader(&self) -> JournalReader {
        JournalReader::new(self.journal.base_path())
    }
}
