//! Schema version entity - The single-row marker of the last applied migration.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Id of the only row the table ever holds.
pub const MARKER_ID: i32 = 1;

/// Schema version database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "schema_version")]
pub struct Model {
    /// Always [`MARKER_ID`]
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    /// Last applied schema version
    pub version: i32,
    /// When the version was last written
    pub updated_at: DateTimeUtc,
}

/// `SchemaVersion` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
