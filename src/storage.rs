//! Storage subsystem
//!
//! Persists accepted reports and the audit trail. Three independent sinks:
//! - `file_storage`: append-only record file, one canonical line per report.
//! - `database_storage`: SQLite `timezone_info` table via SeaORM.
//! - `audit_log`: timestamped event lines.
//!
//! `durable_store` bundles them behind the handle shared by sessions and the console.
//! `db_entities` holds the SeaORM entity model.

pub mod audit_log;
pub mod database_storage;
pub mod db_entities;
pub mod durable_store;
pub mod file_storage;

pub use durable_store::DurableStore;
