//! Database schema definitions
//!
//! Row types cho sqlx mapping từ SQLite tables, và DDL tạo schema.
//!
//! `transactions.tx_key` là AUTOINCREMENT nên không bao giờ bị tái sử dụng:
//! đây là insertion key tăng dần mà balance derivation dựa vào.

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, Utc};
use loyalty_core::{Identity, IdentityKind, LedgerEntry, PinDigest, PointsEntry, Transaction, TransactionKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS identities (
        id          TEXT PRIMARY KEY,
        kind        TEXT NOT NULL CHECK (kind IN ('customer', 'admin')),
        name        TEXT NOT NULL,
        email       TEXT NOT NULL,
        pin_digest  TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        UNIQUE (kind, email)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        tx_key            INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id       TEXT NOT NULL,
        transaction_id    TEXT NOT NULL,
        timestamp         TEXT NOT NULL,
        amount            TEXT NOT NULL,
        payment_method    TEXT NOT NULL,
        acting_admin_id   TEXT NOT NULL,
        points_added      INTEGER,
        points_deducted   INTEGER,
        resulting_balance INTEGER,
        UNIQUE (customer_id, transaction_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_customer ON transactions (customer_id, tx_key)",
    "CREATE INDEX IF NOT EXISTS idx_identities_name ON identities (kind, name)",
];

/// Tạo tables nếu chưa có
pub async fn create_schema(pool: &SqlitePool) -> PersistenceResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Row type cho bảng `identities`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct IdentityRow {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub email: String,
    pub pin_digest: String,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `transactions`
///
/// Ba cột points nullable: record cũ có thể thiếu substructure `points`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TransactionRow {
    pub tx_key: i64,
    pub customer_id: String,
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    pub amount: String, // Decimal stored as TEXT
    pub payment_method: String,
    pub acting_admin_id: String,
    pub points_added: Option<i64>,
    pub points_deducted: Option<i64>,
    pub resulting_balance: Option<i64>,
}

// === Conversion implementations ===

impl From<&Identity> for IdentityRow {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            kind: identity.kind.as_str().to_string(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            pin_digest: identity.pin_digest.as_str().to_string(),
            created_at: identity.created_at,
        }
    }
}

impl TryFrom<IdentityRow> for Identity {
    type Error = PersistenceError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let kind = IdentityKind::parse(&row.kind).map_err(|_| PersistenceError::InvalidEnumValue {
            field: "kind".to_string(),
            value: row.kind.clone(),
        })?;

        Ok(Identity {
            id: row.id,
            kind,
            name: row.name,
            email: row.email,
            pin_digest: PinDigest::new(row.pin_digest),
            created_at: row.created_at,
        })
    }
}

impl TransactionRow {
    /// Substructure `points`, chỉ khi đủ cả ba cột
    pub fn points(&self) -> Option<PointsEntry> {
        match (self.points_added, self.points_deducted, self.resulting_balance) {
            (Some(added), Some(deducted), Some(resulting_balance)) => Some(PointsEntry {
                added,
                deducted,
                resulting_balance,
            }),
            _ => None,
        }
    }
}

impl TryFrom<TransactionRow> for LedgerEntry {
    type Error = PersistenceError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let amount = Decimal::from_str(&row.amount)
            .map_err(|e| PersistenceError::InvalidDecimal(format!("{}: {}", row.amount, e)))?;
        let points = row.points();

        Ok(LedgerEntry {
            key: TransactionKey(row.tx_key),
            customer_id: row.customer_id,
            transaction: Transaction {
                transaction_id: row.transaction_id,
                timestamp: row.timestamp,
                amount,
                payment_method: row.payment_method,
                acting_admin_id: row.acting_admin_id,
                points,
            },
        })
    }
}
