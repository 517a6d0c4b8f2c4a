//! SeaORM entity model used by the database storage backend.
//!
//! Maps the `timezone_info` table created by `database_storage`. Columns hold the
//! report exactly as written to the record file: city, `UTC±n` text and the canonical
//! timestamp text.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "timezone_info")]
pub struct Model {
    /// Row key, aliases the SQLite rowid
    #[sea_orm(primary_key)]
    pub id: i32,
    pub city: String,
    /// Offset as `UTC±n`
    pub timezone: String,
    /// `yyyy-MM-dd HH:mm:ss`
    pub time: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
