use std::path::Path;

use super::audit_log::AuditLog;
use super::database_storage::DatabaseStorage;
use super::db_entities;
use super::file_storage::FileStorage;
use crate::error_handling::types::StorageError;
use crate::validation::TimezoneReport;

/// The three persistence sinks behind one handle.
///
/// Each sink serializes its own operations; there is no lock spanning sinks and no
/// cross-sink atomicity. A slow structured-store insert never holds up the record
/// file or the audit log.
pub struct DurableStore {
    records: FileStorage,
    database: DatabaseStorage,
    audit: AuditLog,
}

impl DurableStore {
    pub fn new(records: FileStorage, database: DatabaseStorage, audit: AuditLog) -> Self {
        Self {
            records,
            database,
            audit,
        }
    }

    /// Opens all three sinks; only the structured store does any I/O up front.
    pub async fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        record_file: P,
        database_url: &str,
        audit_log: Q,
    ) -> Result<Self, StorageError> {
        let database = DatabaseStorage::connect(database_url).await?;
        Ok(Self::new(
            FileStorage::new(record_file),
            database,
            AuditLog::new(audit_log),
        ))
    }

    pub async fn append_record(&self, report: &TimezoneReport) -> Result<(), StorageError> {
        self.records.append_record(report).await
    }

    pub async fn insert_record(&self, report: &TimezoneReport) -> Result<(), StorageError> {
        self.database.insert_record(report).await
    }

    pub async fn append_log(&self, message: &str) -> Result<(), StorageError> {
        self.audit.append(message).await
    }

    pub async fn read_records(&self) -> Result<Vec<String>, StorageError> {
        self.records.read_records().await
    }

    pub async fn list_rows(&self) -> Result<Vec<db_entities::Model>, StorageError> {
        self.database.list_rows().await
    }

    pub async fn read_log(&self) -> Result<Vec<String>, StorageError> {
        self.audit.read_entries().await
    }
}
