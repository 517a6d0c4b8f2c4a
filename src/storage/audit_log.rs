//! Audit log sink.
//!
//! One `[yyyy-MM-dd HH:mm:ss] message` line per event, in append order. Entries are
//! never rewritten. The timestamp is local wall-clock time at the moment of the call.

use std::path::Path;

use chrono::{DateTime, Local};
use log::info;

use super::file_storage::AppendOnlyFile;
use crate::error_handling::types::StorageError;
use crate::validation::report::CANONICAL_TIME_FORMAT;

pub struct AuditLog {
    file: AppendOnlyFile,
}

impl AuditLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let file = AppendOnlyFile::new(path);
        info!("AuditLog initialized at {}", file.path().display());
        Self { file }
    }

    pub async fn append(&self, message: &str) -> Result<(), StorageError> {
        self.file.append_line(&format_entry(Local::now(), message)).await
    }

    pub async fn read_entries(&self) -> Result<Vec<String>, StorageError> {
        self.file.read_lines().await
    }
}

fn format_entry(at: DateTime<Local>, message: &str) -> String {
    // one entry per line, whatever the caller passes in
    let flat = message.replace(['\r', '\n'], " ");
    format!("[{}] {}", at.format(CANONICAL_TIME_FORMAT), flat)
}
