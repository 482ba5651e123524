//! # Balance Module
//!
//! Balance hiện tại của customer là `resulting_balance` của entry mới nhất
//! có substructure `points`, hoặc 0 nếu không có. Không cộng dồn
//! `added`/`deducted` trên read path.
//!
//! [`reconcile`] là kiểm tra phụ: replay toàn bộ history bằng phép cộng và
//! báo các entry có `resulting_balance` lệch.

use crate::transaction::{LedgerEntry, TransactionKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kết quả balance derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceView {
    /// Balance hiện tại
    pub balance: i64,
    /// Timestamp của entry cung cấp balance
    pub last_transaction_at: Option<DateTime<Utc>>,
    /// Key của entry cuối cùng trong sequence (kể cả entry thiếu `points`)
    pub tail_key: Option<TransactionKey>,
}

impl BalanceView {
    /// Balance của history rỗng
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Derive balance từ sequence đã sắp xếp theo insertion key tăng dần.
///
/// Entry thiếu `points` bị bỏ qua, không làm hỏng kết quả.
pub fn derive_balance<'a, I>(entries: I) -> BalanceView
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut view = BalanceView::empty();

    for entry in entries {
        view.tail_key = Some(entry.key);
        if let Some(points) = entry.transaction.points {
            view.balance = points.resulting_balance;
            view.last_transaction_at = Some(entry.transaction.timestamp);
        }
    }

    view
}

/// Một entry có `resulting_balance` không khớp với replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    pub key: TransactionKey,
    /// Balance replay được (previous + added - deducted)
    pub expected: i64,
    /// Balance ghi trong entry
    pub recorded: i64,
}

/// Báo cáo reconciliation cho một customer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub customer_id: String,
    /// Balance theo read path (trust entry cuối)
    pub derived_balance: i64,
    /// Balance replay bằng tổng `added - deducted`
    pub replayed_balance: i64,
    /// Số entry đã xét
    pub entries: usize,
    /// Các entry có `resulting_balance` lệch so với replay
    pub divergences: Vec<Divergence>,
    /// Các entry thiếu `points` hoặc vi phạm invariant added/deducted
    pub malformed: Vec<TransactionKey>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.divergences.is_empty() && self.derived_balance == self.replayed_balance
    }
}

/// Replay sequence và so sánh từng `resulting_balance`.
///
/// Replay dùng `resulting_balance` ghi trong entry trước làm điểm xuất phát
/// cho entry sau, nên một entry lệch chỉ bị báo một lần.
pub fn reconcile<'a, I>(customer_id: &str, entries: I) -> ReconciliationReport
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let entries: Vec<&LedgerEntry> = entries.into_iter().collect();
    let derived = derive_balance(entries.iter().copied());

    let mut report = ReconciliationReport {
        customer_id: customer_id.to_string(),
        derived_balance: derived.balance,
        entries: entries.len(),
        ..Default::default()
    };

    let mut previous_recorded: i64 = 0;
    let mut replayed: i64 = 0;

    for entry in entries {
        let Some(points) = entry.transaction.points else {
            report.malformed.push(entry.key);
            continue;
        };

        if points.kind().is_none() {
            report.malformed.push(entry.key);
        }

        replayed = replayed.saturating_add(points.delta());

        let expected = previous_recorded.saturating_add(points.delta());
        if expected != points.resulting_balance {
            report.divergences.push(Divergence {
                key: entry.key,
                expected,
                recorded: points.resulting_balance,
            });
        }
        previous_recorded = points.resulting_balance;
    }

    report.replayed_balance = replayed;
    report
}
