//! Repository implementations cho SQLite
//!
//! Query cho hai tables `identities` và `transactions`.

use crate::error::{PersistenceError, PersistenceResult, UniqueKey};
use crate::sqlite::schema::{IdentityRow, TransactionRow};
use loyalty_core::{Identity, IdentityField, IdentityKind, Transaction, TransactionKey};
use sqlx::SqlitePool;

// ============================================================================
// Identity Repository
// ============================================================================

/// Repository cho identities table
pub struct IdentityRepo;

impl IdentityRepo {
    /// Lấy identity theo kind + id
    pub async fn get_by_id(
        pool: &SqlitePool,
        kind: IdentityKind,
        id: &str,
    ) -> PersistenceResult<Option<IdentityRow>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT * FROM identities WHERE kind = ? AND id = ?",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    /// Lọc theo một field (email hoặc name)
    pub async fn get_by_field(
        pool: &SqlitePool,
        kind: IdentityKind,
        field: IdentityField,
        value: &str,
    ) -> PersistenceResult<Vec<IdentityRow>> {
        // column() là tên cột cố định, không phải input
        let sql = format!(
            "SELECT * FROM identities WHERE kind = ? AND {} = ? ORDER BY created_at",
            field.column()
        );
        let rows = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(kind.as_str())
            .bind(value)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    pub async fn count(pool: &SqlitePool, kind: IdentityKind) -> PersistenceResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM identities WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(pool)
            .await?;
        Ok(count.0)
    }

    /// Thêm identity mới
    pub async fn insert(pool: &SqlitePool, identity: &Identity) -> PersistenceResult<()> {
        let row = IdentityRow::from(identity);
        let result = sqlx::query(
            "INSERT INTO identities (id, kind, name, email, pin_digest, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.kind)
        .bind(&row.name)
        .bind(&row.email)
        .bind(&row.pin_digest)
        .bind(row.created_at)
        .execute(pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let key = UniqueKey::from_sqlite_message(db.message()).unwrap_or(UniqueKey::IdentityEmail);
                let detail = match key {
                    UniqueKey::IdentityId => row.id.clone(),
                    _ => format!("{} email {}", row.kind, row.email),
                };
                Err(PersistenceError::unique(key, detail))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert administrator chỉ khi bảng chưa có admin nào.
    ///
    /// Check và insert nằm trong một statement; SQLite giữ write lock từ đầu
    /// statement nên hai writer không thể cùng thấy bảng rỗng.
    pub async fn insert_first_admin(pool: &SqlitePool, admin: &Identity) -> PersistenceResult<bool> {
        let row = IdentityRow::from(admin);
        let result = sqlx::query(
            "INSERT INTO identities (id, kind, name, email, pin_digest, created_at) \
             SELECT ?, ?, ?, ?, ?, ? \
             WHERE NOT EXISTS (SELECT 1 FROM identities WHERE kind = ?)",
        )
        .bind(&row.id)
        .bind(&row.kind)
        .bind(&row.name)
        .bind(&row.email)
        .bind(&row.pin_digest)
        .bind(row.created_at)
        .bind(IdentityKind::Admin.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

// ============================================================================
// Transaction Repository
// ============================================================================

/// Repository cho transactions table
pub struct TransactionRepo;

impl TransactionRepo {
    /// Toàn bộ history của customer, tx_key tăng dần
    pub async fn get_by_customer(pool: &SqlitePool, customer_id: &str) -> PersistenceResult<Vec<TransactionRow>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE customer_id = ? ORDER BY tx_key ASC",
        )
        .bind(customer_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Entry có tx_key lớn nhất
    pub async fn get_last(pool: &SqlitePool, customer_id: &str) -> PersistenceResult<Option<TransactionRow>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE customer_id = ? ORDER BY tx_key DESC LIMIT 1",
        )
        .bind(customer_id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn tail_key(pool: &SqlitePool, customer_id: &str) -> PersistenceResult<Option<TransactionKey>> {
        let tail: (Option<i64>,) =
            sqlx::query_as("SELECT MAX(tx_key) FROM transactions WHERE customer_id = ?")
                .bind(customer_id)
                .fetch_one(pool)
                .await?;
        Ok(tail.0.map(TransactionKey))
    }

    /// Tìm theo idempotency token
    pub async fn get_by_transaction_id(
        pool: &SqlitePool,
        customer_id: &str,
        transaction_id: &str,
    ) -> PersistenceResult<Option<TransactionRow>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE customer_id = ? AND transaction_id = ?",
        )
        .bind(customer_id)
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    /// Insert có điều kiện.
    ///
    /// `expected_tail = None` ghi vô điều kiện. `Some(k)` chỉ ghi khi
    /// MAX(tx_key) của customer đúng bằng `k` (0 cho sequence rỗng); check và
    /// insert nằm trong cùng một statement nên không có khe hở giữa chúng.
    ///
    /// Trả về key mới, hoặc `None` nếu điều kiện không khớp.
    pub async fn insert_if_tail(
        pool: &SqlitePool,
        customer_id: &str,
        transaction: &Transaction,
        expected_tail: Option<i64>,
    ) -> PersistenceResult<Option<TransactionKey>> {
        let points = transaction.points;
        let columns = "INSERT INTO transactions (customer_id, transaction_id, timestamp, amount, \
             payment_method, acting_admin_id, points_added, points_deducted, resulting_balance)";
        let sql = match expected_tail {
            None => format!("{} VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)", columns),
            Some(_) => format!(
                "{} SELECT ?, ?, ?, ?, ?, ?, ?, ?, ? \
                 WHERE COALESCE((SELECT MAX(tx_key) FROM transactions WHERE customer_id = ?), 0) = ?",
                columns
            ),
        };

        let mut query = sqlx::query(&sql)
            .bind(customer_id)
            .bind(&transaction.transaction_id)
            .bind(transaction.timestamp)
            .bind(transaction.amount.to_string())
            .bind(&transaction.payment_method)
            .bind(&transaction.acting_admin_id)
            .bind(points.map(|p| p.added))
            .bind(points.map(|p| p.deducted))
            .bind(points.map(|p| p.resulting_balance));
        if let Some(tail) = expected_tail {
            query = query.bind(customer_id).bind(tail);
        }

        match query.execute(pool).await {
            Ok(result) if result.rows_affected() == 0 => Ok(None),
            Ok(result) => Ok(Some(TransactionKey(result.last_insert_rowid()))),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(PersistenceError::unique(
                UniqueKey::TransactionId,
                format!("transaction {} for customer {}", transaction.transaction_id, customer_id),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
