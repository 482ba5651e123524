//! Append-only journal writer

use crate::error::{PersistenceError, PersistenceResult};
use chrono::Utc;
use loyalty_core::LedgerEvent;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Audit journal - ghi events vào files JSONL.
///
/// Files được tổ chức theo ngày: `data/journal/2026-01-25.jsonl`
pub struct AuditJournal {
    base_path: PathBuf,
    current_writer: Mutex<Option<JournalWriter>>,
}

struct JournalWriter {
    date: String,
    writer: BufWriter<File>,
}

impl AuditJournal {
    /// Tạo journal, tạo thư mục nếu chưa có
    pub fn new<P: AsRef<Path>>(base_path: P) -> PersistenceResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            current_writer: Mutex::new(None),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn file_path(&self, date: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", date))
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, Option<JournalWriter>>> {
        self.current_writer
            .lock()
            .map_err(|_| PersistenceError::Other("journal writer lock poisoned".to_string()))
    }

    /// Ghi một event (một dòng JSON), flush ngay
    pub fn append(&self, event: &LedgerEvent) -> PersistenceResult<()> {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let json = event.to_json()?;

        let mut guard = self.lock()?;

        let needs_new_file = guard.as_ref().map_or(true, |w| w.date != date);
        if needs_new_file {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.file_path(&date))?;
            *guard = Some(JournalWriter {
                date,
                writer: BufWriter::new(file),
            });
        }

        if let Some(ref mut w) = *guard {
            writeln!(w.writer, "{}", json)?;
            w.writer.flush()?;
        }

        Ok(())
    }

    /// Các journal file hiện có, sắp xếp theo ngày
    pub fn list_files(&self) -> PersistenceResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "jsonl") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn flush(&self) -> PersistenceResult<()> {
        let mut guard = self.lock()?;
        if let Some(ref mut w) = *guard {
            w.writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for AuditJournal {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
