//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the ledger tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod bucket;
pub mod schema_version;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use bucket::{Column as BucketColumn, Entity as Bucket, Model as BucketModel};
pub use schema_version::{
    Column as SchemaVersionColumn, Entity as SchemaVersion, Model as SchemaVersionModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionKind,
};
