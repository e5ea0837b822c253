//! SeaORM entity model used by the database storage backend.
//!
//! Maps to the SQLite table created by `database_storage`:
//! - `sessions`: one row per session; the full document as JSON plus the
//!   columns the listing filters and the retention sweep query on.

use sea_orm::entity::prelude::*;

/// Sessions table entity model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Join code, primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub group_name: String,
    pub is_open: bool,
    /// RFC3339 UTC timestamp with fixed precision so it sorts as text
    pub created_at: String,
    /// Serialized `Session` document
    #[sea_orm(column_type = "Text")]
    pub document: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
