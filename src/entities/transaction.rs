//! Transaction entity - One immutable ledger entry.
//!
//! Each transaction has a `kind` (expense/income), a strictly positive `amount`, the
//! `balance_snapshot` of total wealth right after it was recorded, an optional
//! `bucket_id` and an `is_transfer` flag for money moved between the free balance
//! and a bucket.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money leaving the ledger (or a bucket)
    #[sea_orm(string_value = "expense")]
    Expense,
    /// Money entering the ledger (or a bucket)
    #[sea_orm(string_value = "income")]
    Income,
}

impl TransactionKind {
    /// Applies this kind's sign to `amount`.
    #[must_use]
    pub fn signed(self, amount: f64) -> f64 {
        match self {
            Self::Income => amount,
            Self::Expense => -amount,
        }
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier, assigned in recording order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Expense or income
    pub kind: TransactionKind,
    /// Strictly positive amount
    pub amount: f64,
    /// Total balance (free + all buckets) as of this entry; never rewritten
    pub balance_snapshot: f64,
    /// Optional free-text description
    pub description: Option<String>,
    /// When the transaction happened
    pub timestamp: DateTimeUtc,
    /// Bucket the transaction belongs to, `None` for the free balance
    pub bucket_id: Option<i64>,
    /// Marks money moved between the free balance and a bucket
    pub is_transfer: bool,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction optionally belongs to one bucket
    #[sea_orm(
        belongs_to = "super::bucket::Entity",
        from = "Column::BucketId",
        to = "super::bucket::Column::Id"
    )]
    Bucket,
}

impl Related<super::bucket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bucket.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
