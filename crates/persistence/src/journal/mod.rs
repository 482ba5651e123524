//! JSONL audit journal
//!
//! Ghi [`loyalty_core::LedgerEvent`] vào files theo ngày. Journal là bản ghi
//! phụ: mất journal không ảnh hưởng balance.

pub mod reader;
pub mod store;

pub use reader::{JournalFilter, JournalReader};
pub use store::AuditJournal;
