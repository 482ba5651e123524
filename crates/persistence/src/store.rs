//! Ledger store interface
//!
//! Remote Ledger Store nhìn từ core: identities + transaction sequence theo
//! customer. Store phải đảm bảo:
//! - insertion key tăng dần nghiêm ngặt trong một customer
//! - `append_transaction` là atomic: reader không bao giờ thấy transaction dở dang
//! - `AppendCondition::ExpectTail` chỉ ghi khi tail key đúng như caller đã đọc

use crate::error::PersistenceResult;
use async_trait::async_trait;
use loyalty_core::{Identity, IdentityField, IdentityKind, LedgerEntry, Transaction, TransactionKey};

/// Điều kiện cho append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendCondition {
    /// Ghi vô điều kiện
    Unconditional,
    /// Chỉ ghi nếu tail key hiện tại bằng giá trị này (`None` = sequence rỗng)
    ExpectTail(Option<TransactionKey>),
}

impl AppendCondition {
    pub fn matches(&self, actual_tail: Option<TransactionKey>) -> bool {
        match self {
            AppendCondition::Unconditional => true,
            AppendCondition::ExpectTail(expected) => *expected == actual_tail,
        }
    }
}

/// Kết quả append
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Đã ghi với key mới
    Appended(TransactionKey),
    /// `transaction_id` đã tồn tại: không ghi lại, trả entry cũ
    Duplicate(LedgerEntry),
    /// Tail đã thay đổi kể từ lúc caller đọc
    Conflict { actual_tail: Option<TransactionKey> },
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Lấy identity theo id
    async fn get_identity(&self, kind: IdentityKind, id: &str) -> PersistenceResult<Option<Identity>>;

    /// `queryByField` trên collection identities của một kind
    async fn query_by_field(
        &self,
        kind: IdentityKind,
        field: IdentityField,
        value: &str,
    ) -> PersistenceResult<Vec<Identity>>;

    async fn count_identities(&self, kind: IdentityKind) -> PersistenceResult<i64>;

    /// Thêm identity mới; email trùng trong cùng kind trả `UniqueViolation`
    async fn insert_identity(&self, identity: &Identity) -> PersistenceResult<()>;

    /// Thêm administrator đầu tiên. Check "chưa có admin nào" và insert là
    /// một thao tác atomic; trả `false` (không ghi gì) nếu đã có admin.
    async fn insert_bootstrap_admin(&self, admin: &Identity) -> PersistenceResult<bool>;

    /// Entry cuối cùng (theo insertion key) của customer
    async fn last_transaction(&self, customer_id: &str) -> PersistenceResult<Option<LedgerEntry>>;

    /// Toàn bộ sequence, key tăng dần
    async fn transactions(&self, customer_id: &str) -> PersistenceResult<Vec<LedgerEntry>>;

    /// Tìm entry theo idempotency token
    async fn find_transaction(
        &self,
        customer_id: &str,
        transaction_id: &str,
    ) -> PersistenceResult<Option<LedgerEntry>>;

    /// Append transaction vào tail của sequence
    async fn append_transaction(
        &self,
        customer_id: &str,
        transaction: &Transaction,
        condition: AppendCondition,
    ) -> PersistenceResult<AppendOutcome>;
}
