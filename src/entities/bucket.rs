//! Bucket entity - A named savings pot ("piggy bank").
//!
//! Each bucket has a name, display color, optional savings target and a cached balance
//! that mirrors the signed sum of its transactions. Buckets are never physically
//! deleted; hiding one flips `visible` and keeps its history reachable.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bucket database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "buckets")]
pub struct Model {
    /// Unique identifier for the bucket
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable name (e.g., "Vacation", "New laptop")
    pub name: String,
    /// Cached balance, kept in sync with the bucket's transactions
    pub balance: f64,
    /// Display color, stored as given by the caller (e.g., `"#4caf50"`)
    pub color: String,
    /// Optional savings goal, always positive when present
    pub target_amount: Option<f64>,
    /// Optional date the goal should be reached by
    pub target_date: Option<Date>,
    /// Visibility flag - false means the bucket was soft-deleted
    pub visible: bool,
}

/// Defines relationships between Bucket and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One bucket has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
