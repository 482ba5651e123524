//! # Transaction Module
//!
//! Một Transaction là một ledger event bất biến của một customer.
//!
//! Invariants:
//! - đúng một trong `added` / `deducted` khác 0
//! - `resulting_balance = previous_resulting_balance + added - deducted`

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Loại operation: tích điểm hoặc tiêu điểm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Credit,
    Debit,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Credit => "credit",
            OperationKind::Debit => "debit",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s.to_lowercase().as_str() {
            "credit" => Ok(OperationKind::Credit),
            "debit" => Ok(OperationKind::Debit),
            other => Err(CoreError::UnknownOperationKind(other.to_string())),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Insertion key do store cấp, tăng dần nghiêm ngặt trong một customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionKey(pub i64);

impl TransactionKey {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Substructure `points` của transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsEntry {
    pub added: i64,
    pub deducted: i64,
    /// Balance tuyệt đối ngay sau transaction này
    pub resulting_balance: i64,
}

impl PointsEntry {
    /// Operation kind suy ra từ field khác 0
    pub fn kind(&self) -> Option<OperationKind> {
        match (self.added, self.deducted) {
            (a, 0) if a > 0 => Some(OperationKind::Credit),
            (0, d) if d > 0 => Some(OperationKind::Debit),
            _ => None,
        }
    }

    /// Delta có dấu: `added - deducted`
    pub fn delta(&self) -> i64 {
        self.added - self.deducted
    }

    /// Kiểm tra entry khớp với balance trước đó
    pub fn follows(&self, previous_balance: i64) -> bool {
        self.kind().is_some()
            && previous_balance.checked_add(self.delta()) == Some(self.resulting_balance)
    }
}

/// Một ledger event của customer.
///
/// `points` là `Option` vì record cũ trong store có thể thiếu substructure
/// này; balance derivation bỏ qua các entry đó.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Client-generated id, dùng làm idempotency token
    pub transaction_id: String,
    /// Thời gian tạo (UTC)
    pub timestamp: DateTime<Utc>,
    /// Số tiền gây ra transaction
    pub amount: Decimal,
    /// Phương thức thanh toán (e.g. "Cash")
    pub payment_method: String,
    /// Admin thực hiện
    pub acting_admin_id: String,
    /// Điểm cộng/trừ và balance sau transaction
    pub points: Option<PointsEntry>,
}

impl Transaction {
    /// Tạo transaction mới tiếp nối `previous_balance`.
    ///
    /// Debit vượt quá balance trả về `InsufficientBalance`.
    pub fn new(
        transaction_id: &str,
        kind: OperationKind,
        previous_balance: i64,
        points: i64,
        amount: Decimal,
        payment_method: &str,
        acting_admin_id: &str,
    ) -> CoreResult<Self> {
        if points <= 0 {
            return Err(CoreError::InvalidTransaction(format!(
                "points delta must be positive, got {}",
                points
            )));
        }

        let entry = match kind {
            OperationKind::Credit => PointsEntry {
                added: points,
                deducted: 0,
                resulting_balance: previous_balance
                    .checked_add(points)
                    .ok_or(CoreError::BalanceOverflow)?,
            },
            OperationKind::Debit => {
                if points > previous_balance {
                    return Err(CoreError::InsufficientBalance {
                        needed: points,
                        available: previous_balance,
                    });
                }
                PointsEntry {
                    added: 0,
                    deducted: points,
                    resulting_balance: previous_balance - points,
                }
            }
        };

        Ok(Self {
            transaction_id: transaction_id.to_string(),
            timestamp: Utc::now(),
            amount,
            payment_method: payment_method.to_string(),
            acting_admin_id: acting_admin_id.to_string(),
            points: Some(entry),
        })
    }

    /// Generate transaction id (idempotency token) mới
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn kind(&self) -> Option<OperationKind> {
        self.points.as_ref().and_then(PointsEntry::kind)
    }

    pub fn resulting_balance(&self) -> Option<i64> {
        self.points.map(|p| p.resulting_balance)
    }
}

/// Transaction đã được store ghi nhận cùng insertion key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub key: TransactionKey,
    pub customer_id: String,
    pub transaction: Transaction,
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tx = &self.transaction;
        match tx.points {
            Some(p) => write!(
                f,
                "#{} [{}] +{} -{} = {} (amount {} {}, by {})",
                self.key,
                tx.timestamp.format("%Y-%m-%d %H:%M:%S"),
                p.added,
                p.deducted,
                p.resulting_balance,
                tx.amount,
                tx.payment_method,
                tx.acting_admin_id
            ),
            None => write!(
                f,
                "#{} [{}] <no points> (amount {} {}, by {})",
                self.key,
                tx.timestamp.format("%Y-%m-%d %H:%M:%S"),
                tx.amount,
                tx.payment_method,
                tx.acting_admin_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_transaction() {
        let tx = Transaction::new("t1", OperationKind::Credit, 10, 5, dec!(500), "Cash", "ADM")
            .unwrap();
        let points = tx.points.unwrap();

        assert_eq!(points.added, 5);
        assert_eq!(points.deducted, 0);
        assert_eq!(points.resulting_balance, 15);
        assert_eq!(tx.kind(), Some(OperationKind::Credit));
        assert!(points.follows(10));
        assert!(!points.follows(11));
    }

    #[test]
    fn test_debit_transaction() {
        let tx = Transaction::new("t2", OperationKind::Debit, 5, 5, dec!(5), "Cash", "ADM")
            .unwrap();
        let points = tx.points.unwrap();

        assert_eq!(points.added, 0);
        assert_eq!(points.deducted, 5);
        assert_eq!(points.resulting_balance, 0);
        assert_eq!(points.delta(), -5);
        assert_eq!(tx.kind(), Some(OperationKind::Debit));
    }

    #[test]
    fn test_debit_exceeding_balance() {
        let err = Transaction::new("t3", OperationKind::Debit, 5, 6, dec!(6), "Cash", "ADM")
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientBalance {
                needed: 6,
                available: 5
            }
        );
    }

    #[test]
    fn test_zero_points_rejected() {
        let err = Transaction::new("t4", OperationKind::Credit, 0, 0, dec!(1), "Cash", "ADM")
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransaction(_)));
    }

    #[test]
    fn test_credit_overflow() {
        let err = Transaction::new("t5", OperationKind::Credit, i64::MAX, 1, dec!(100), "Cash", "ADM")
            .unwrap_err();
        assert_eq!(err, CoreError::BalanceOverflow);
    }

    #[test]
    fn test_points_entry_kind() {
        let both = PointsEntry {
            added: 1,
            deducted: 1,
            resulting_balance: 0,
        };
        assert_eq!(both.kind(), None);
        assert!(!both.follows(0));

        let neither = PointsEntry {
            added: 0,
            deducted: 0,
            resulting_balance: 0,
        };
        assert_eq!(neither.kind(), None);
    }

    #[test]
    fn test_operation_kind_parse() {
        assert_eq!(OperationKind::parse("Credit").unwrap(), OperationKind::Credit);
        assert_eq!(OperationKind::parse("debit").unwrap(), OperationKind::Debit);
        assert!(OperationKind::parse("refund").is_err());
    }

    #[test]
    fn test_transaction_json_shape() {
        let tx = Transaction::new("t6", OperationKind::Credit, 0, 5, dec!(500), "Cash", "ADM")
            .unwrap();
        let json = serde_json::to_string(&tx).unwrap();

        assert!(json.contains("\"transaction_id\":\"t6\""));
        assert!(json.contains("\"resulting_balance\":5"));
        assert!(json.contains("\"amount\":\"500\""));
    }
}
