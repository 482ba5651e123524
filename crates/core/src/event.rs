//! # Event Module
//!
//! Audit events ghi vào JSONL journal. Journal là bản ghi phụ: nguồn sự thật
//! của balance vẫn là transaction sequence trong store.

use crate::balance::ReconciliationReport;
use crate::identity::{Identity, IdentityKind};
use crate::transaction::{LedgerEntry, OperationKind, PointsEntry, TransactionKey};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Loại audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Transaction đã được store ghi nhận
    TransactionRecorded,
    /// Customer/Admin mới đăng ký
    IdentityRegistered,
    /// PIN sai (không bao giờ chứa PIN)
    PinRejected,
    /// Reconciliation phát hiện `resulting_balance` lệch
    ReconciliationDivergence,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TransactionRecorded => "transaction_recorded",
            EventType::IdentityRegistered => "identity_registered",
            EventType::PinRejected => "pin_rejected",
            EventType::ReconciliationDivergence => "reconciliation_divergence",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Một dòng trong audit journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// Identity bị tác động (customer của transaction, identity mới, ...)
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_kind: Option<IdentityKind>,
    /// Admin thực hiện, nếu có
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<PointsEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_key: Option<TransactionKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LedgerEvent {
    pub fn new(event_type: EventType, subject_id: &str) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            subject_id: subject_id.to_string(),
            subject_kind: None,
            actor_id: None,
            operation: None,
            amount: None,
            points: None,
            transaction_key: None,
            description: None,
        }
    }

    // === Builder methods ===

    pub fn with_subject_kind(mut self, kind: IdentityKind) -> Self {
        self.subject_kind = Some(kind);
        self
    }

    pub fn with_actor(mut self, actor_id: &str) -> Self {
        self.actor_id = Some(actor_id.to_string());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    // === Factory methods ===

    /// Event cho transaction vừa append
    pub fn transaction_recorded(entry: &LedgerEntry) -> Self {
        let tx = &entry.transaction;
        let mut event = Self::new(EventType::TransactionRecorded, &entry.customer_id)
            .with_subject_kind(IdentityKind::Customer)
            .with_actor(&tx.acting_admin_id);
        event.operation = tx.kind();
        event.amount = Some(tx.amount);
        event.points = tx.points;
        event.transaction_key = Some(entry.key);
        event
    }

    /// Event cho identity mới; `actor_id` là admin đã cho phép (nếu có)
    pub fn identity_registered(identity: &Identity, actor_id: Option<&str>) -> Self {
        let event = Self::new(EventType::IdentityRegistered, &identity.id)
            .with_subject_kind(identity.kind)
            .with_description(format!("{} <{}>", identity.name, identity.email));
        match actor_id {
            Some(actor) => event.with_actor(actor),
            None => event,
        }
    }

    /// Event cho PIN sai
    pub fn pin_rejected(identity_id: &str, kind: Option<IdentityKind>) -> Self {
        let event = Self::new(EventType::PinRejected, identity_id);
        match kind {
            Some(kind) => event.with_subject_kind(kind),
            None => event,
        }
    }

    /// Event cho reconciliation lệch
    pub fn reconciliation_divergence(report: &ReconciliationReport) -> Self {
        Self::new(EventType::ReconciliationDivergence, &report.customer_id)
            .with_subject_kind(IdentityKind::Customer)
            .with_description(format!(
                "derived {} replayed {} divergences {} malformed {}",
                report.derived_balance,
                report.replayed_balance,
                report.divergences.len(),
                report.malformed.len()
            ))
    }

    /// Serialize event thành JSON string (cho JSONL)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} on {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.event_type,
            self.subject_id
        )?;
        if let Some(actor) = &self.actor_id {
            write!(f, " by {}", actor)?;
        }
        if let Some(points) = &self.points {
            write!(
                f,
                " (+{} -{} = {})",
                points.added, points.deducted, points.resulting_balance
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::PinDigest;
    use crate::transaction::Transaction;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_recorded_event() {
        let tx = Transaction::new("t1", OperationKind::Credit, 0, 5, dec!(500), "Cash", "ADM_1")
            .unwrap();
        let entry = LedgerEntry {
            key: TransactionKey(7),
            customer_id: "CUST_1".to_string(),
            transaction: tx,
        };
        let event = LedgerEvent::transaction_recorded(&entry);

        assert_eq!(event.event_type, EventType::TransactionRecorded);
        assert_eq!(event.subject_id, "CUST_1");
        assert_eq!(event.actor_id.as_deref(), Some("ADM_1"));
        assert_eq!(event.operation, Some(OperationKind::Credit));
        assert_eq!(event.transaction_key, Some(TransactionKey(7)));
        assert_eq!(event.points.map(|p| p.resulting_balance), Some(5));
    }

    #[test]
    fn test_identity_registered_event_has_no_digest() {
        let identity = Identity::admin("Root", "root@shop.com", PinDigest::new("secret-digest"))
            .unwrap();
        let event = LedgerEvent::identity_registered(&identity, None);
        let json = event.to_json().unwrap();

        assert!(json.contains("identity_registered"));
        assert!(json.contains("root@shop.com"));
        assert!(!json.contains("secret-digest"));
        assert!(!json.contains("actor_id"));
    }

    #[test]
    fn test_pin_rejected_event() {
        let event = LedgerEvent::pin_rejected("ADM_9", Some(IdentityKind::Admin));
        assert_eq!(event.event_type, EventType::PinRejected);
        assert_eq!(event.subject_kind, Some(IdentityKind::Admin));
        assert!(event.to_string().contains("pin_rejected on ADM_9"));
    }

    #[test]
    fn test_event_json_roundtrip() {
        let event = LedgerEvent::pin_rejected("CUST_2", None).with_description("keypad");
        let json = event.to_json().unwrap();
        let parsed: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
