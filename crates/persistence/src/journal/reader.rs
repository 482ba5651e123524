//! Journal reader - đọc lại events để audit

use crate::error::{PersistenceError, PersistenceResult};
use chrono::NaiveDate;
use loyalty_core::{EventType, LedgerEvent};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Đọc events từ các file JSONL của journal
pub struct JournalReader {
    base_path: PathBuf,
}

impl JournalReader {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Đọc tất cả events từ một file
    pub fn read_file(&self, file_path: &Path) -> PersistenceResult<Vec<LedgerEvent>> {
        let reader = BufReader::new(File::open(file_path)?);
        let mut events = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: LedgerEvent = serde_json::from_str(&line)?;
            events.push(event);
        }

        Ok(events)
    }

    /// Đọc events của một ngày (YYYY-MM-DD)
    pub fn read_date(&self, date: &str) -> PersistenceResult<Vec<LedgerEvent>> {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| PersistenceError::Other(format!("Invalid date {}: {}", date, e)))?;

        let file_path = self.base_path.join(format!("{}.jsonl", date));
        if file_path.exists() {
            self.read_file(&file_path)
        } else {
            Ok(Vec::new())
        }
    }

    /// Đọc tất cả events, theo thứ tự file rồi thứ tự dòng
    pub fn read_all(&self) -> PersistenceResult<Vec<LedgerEvent>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.base_path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "jsonl"))
            .collect();
        files.sort();

        let mut all_events = Vec::new();
        for file_path in files {
            all_events.extend(self.read_file(&file_path)?);
        }
        Ok(all_events)
    }
}

/// Lọc events theo điều kiện
#[derive(Debug, Default, Clone)]
pub struct JournalFilter {
    pub subject_id: Option<String>,
    pub actor_id: Option<String>,
    pub event_types: Option<Vec<EventType>>,
}

impl JournalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject_id: &str) -> Self {
        self.subject_id = Some(subject_id.to_string());
        self
    }

    pub fn actor(mut self, actor_id: &str) -> Self {
        self.actor_id = Some(actor_id.to_string());
        self
    }

    pub fn event_types(mut self, types: Vec<EventType>) -> Self {
        self.event_types = Some(types);
        self
    }

    pub fn matches(&self, event: &LedgerEvent) -> bool {
        if let Some(ref subject) = self.subject_id {
            if event.subject_id != *subject {
                return false;
            }
        }
        if let Some(ref actor) = self.actor_id {
            if event.actor_id.as_deref() != Some(actor.as_str()) {
                return false;
            }
        }
        if let Some(ref types) = self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, events: Vec<LedgerEvent>) -> Vec<LedgerEvent> {
        events.into_iter().filter(|e| self.matches(e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::AuditJournal;
    use tempfile::tempdir;

    #[test]
    fn test_read_back_and_filter() {
        let dir = tempdir().unwrap();
        let journal = AuditJournal::new(dir.path()).unwrap();
        journal.append(&LedgerEvent::pin_rejected("A", None)).unwrap();
        journal
            .append(&LedgerEvent::pin_rejected("B", None).with_actor("ADM"))
            .unwrap();

        let events = JournalReader::new(dir.path()).read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].subject_id, "A");

        let only_b = JournalFilter::new().subject("B").apply(events.clone());
        assert_eq!(only_b.len(), 1);

        let by_actor = JournalFilter::new().actor("ADM").apply(events.clone());
        assert_eq!(by_actor[0].subject_id, "B");

        let none = JournalFilter::new()
            .event_types(vec![EventType::TransactionRecorded])
            .apply(events);
        assert!(none.is_empty());
    }

    #[test]
    fn test_missing_directory_reads_empty() {
        let dir = tempdir().unwrap();
        let reader = JournalReader::new(dir.path().join("nope"));
        assert!(reader.read_all().unwrap().is_empty());
        assert!(reader.read_date("2026-01-01").unwrap().is_empty());
        assert!(reader.read_date("yesterday").is_err());
    }
}
