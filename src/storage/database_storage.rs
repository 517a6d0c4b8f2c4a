use log::{debug, error, info};
use sea_orm::{
    ActiveValue::Set, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryOrder,
};
use tokio::sync::Mutex;

use super::db_entities as timezone_info;
use crate::error_handling::types::StorageError;
use crate::validation::TimezoneReport;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS timezone_info (
    id INTEGER PRIMARY KEY,
    city TEXT NOT NULL,
    timezone TEXT NOT NULL,
    time TEXT NOT NULL
);";

/// Structured report store behind one shared connection string.
///
/// Inserts are serialized through a store-private lock; reads go straight to the pool.
pub struct DatabaseStorage {
    db: DatabaseConnection,
    write_lock: Mutex<()>,
}

impl DatabaseStorage {
    /// Connects to `url` (e.g. `sqlite://timezone.db?mode=rwc`) and creates the
    /// `timezone_info` table if it does not exist yet.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let mut opts = ConnectOptions::new(url.to_owned());
        opts.max_connections(5).sqlx_logging(false);

        let db = Database::connect(opts).await.map_err(|e| {
            error!("Failed to connect to structured store {}: {}", url, e);
            StorageError::Store(e)
        })?;

        db.execute_unprepared(CREATE_TABLE).await.map_err(|e| {
            error!("Failed to create timezone_info table: {}", e);
            StorageError::Store(e)
        })?;

        info!("DatabaseStorage initialized at {}", url);
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    pub async fn insert_record(&self, report: &TimezoneReport) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let row = timezone_info::ActiveModel {
            city: Set(report.city().to_string()),
            timezone: Set(report.zone().to_string()),
            time: Set(report.timestamp().to_string()),
            ..Default::default()
        };

        let res = timezone_info::Entity::insert(row)
            .exec(&self.db)
            .await
            .map_err(|e| {
                error!("Insert failed for {}: {}", report, e);
                StorageError::Store(e)
            })?;

        debug!("Inserted row {} for {}", res.last_insert_id, report.city());
        Ok(())
    }

    /// All rows in insertion order.
    pub async fn list_rows(&self) -> Result<Vec<timezone_info::Model>, StorageError> {
        timezone_info::Entity::find()
            .order_by_asc(timezone_info::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| {
                error!("Query failed on timezone_info: {}", e);
                StorageError::Store(e)
            })
    }
}
