//! [`LedgerStore`] trên SQLite

use crate::error::PersistenceResult;
use crate::sqlite::repos::{IdentityRepo, TransactionRepo};
use crate::sqlite::schema::create_schema;
use crate::store::{AppendCondition, AppendOutcome, LedgerStore};
use async_trait::async_trait;
use loyalty_core::{Identity, IdentityField, IdentityKind, LedgerEntry, Transaction};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// SQLite-backed ledger store
#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Wrap pool có sẵn (schema phải đã được tạo)
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Mở database từ URL (e.g. "sqlite:loyalty.db"), tạo file và schema nếu chưa có
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> PersistenceResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(acquire_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;
        create_schema(&pool).await?;
        debug!(url = database_url, "SQLite ledger store ready");
        Ok(Self { pool })
    }

    /// In-memory database cho tests. Một connection duy nhất và không bao giờ
    /// bị đóng, vì mỗi connection `:memory:` là một database riêng.
    pub async fn in_memory() -> PersistenceResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        create_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn get_identity(&self, kind: IdentityKind, id: &str) -> PersistenceResult<Option<Identity>> {
        IdentityRepo::get_by_id(&self.pool, kind, id)
            .await?
            .map(Identity::try_from)
            .transpose()
    }

    async fn query_by_field(
        &self,
        kind: IdentityKind,
        field: IdentityField,
        value: &str,
    ) -> PersistenceResult<Vec<Identity>> {
        IdentityRepo::get_by_field(&self.pool, kind, field, value)
            .await?
            .into_iter()
            .map(Identity::try_from)
            .collect()
    }

    async fn count_identities(&self, kind: IdentityKind) -> PersistenceResult<i64> {
        IdentityRepo::count(&self.pool, kind).await
    }

    async fn insert_identity(&self, identity: &Identity) -> PersistenceResult<()> {
        IdentityRepo::insert(&self.pool, identity).await
    }

    async fn insert_bootstrap_admin(&self, admin: &Identity) -> PersistenceResult<bool> {
        IdentityRepo::insert_first_admin(&self.pool, admin).await
    }

    async fn last_transaction(&self, customer_id: &str) -> PersistenceResult<Option<LedgerEntry>> {
        TransactionRepo::get_last(&self.pool, customer_id)
            .await?
            .map(LedgerEntry::try_from)
            .transpose()
    }

    async fn transactions(&self, customer_id: &str) -> PersistenceResult<Vec<LedgerEntry>> {
        TransactionRepo::get_by_customer(&self.pool, customer_id)
            .await?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }

    async fn find_transaction(
        &self,
        customer_id: &str,
        transaction_id: &str,
    ) -> PersistenceResult<Option<LedgerEntry>> {
        TransactionRepo::get_by_transaction_id(&self.pool, customer_id, transaction_id)
            .await?
            .map(LedgerEntry::try_from)
            .transpose()
    }

    async fn append_transaction(
        &self,
        customer_id: &str,
        transaction: &Transaction,
        condition: AppendCondition,
    ) -> PersistenceResult<AppendOutcome> {
        if let Some(existing) = self
            .find_transaction(customer_id, &transaction.transaction_id)
            .await?
        {
            return Ok(AppendOutcome::Duplicate(existing));
        }

        let expected_tail = match condition {
            AppendCondition::Unconditional => None,
            AppendCondition::ExpectTail(tail) => Some(tail.map_or(0, |k| k.value())),
        };

        match TransactionRepo::insert_if_tail(&self.pool, customer_id, transaction, expected_tail).await {
            Ok(Some(key)) => Ok(AppendOutcome::Appended(key)),
            Ok(None) => {
                let actual_tail = TransactionRepo::tail_key(&self.pool, customer_id).await?;
                Ok(AppendOutcome::Conflict { actual_tail })
            }
            // Writer khác vừa ghi cùng transaction_id
            Err(e) if e.is_unique_violation() => {
                match self
                    .find_transaction(customer_id, &transaction.transaction_id)
                    .await?
                {
                    Some(existing) => Ok(AppendOutcome::Duplicate(existing)),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}
