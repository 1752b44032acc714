//! Shared test utilities for the ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        bucket::{self, BucketDetails},
        transaction::NewTransaction,
    },
    entities,
    errors::Result,
    schema::migrate,
};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database migrated to the current schema.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    migrate(&db).await?;
    Ok(db)
}

/// Creates a test bucket with sensible defaults.
///
/// # Defaults
/// * `color`: `"#4caf50"`
/// * no target
pub async fn create_test_bucket(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::bucket::Model> {
    bucket::create_bucket(db, BucketDetails::new(name, "#4caf50")).await
}

/// Creates a test bucket with a savings target.
pub async fn create_custom_bucket(
    db: &DatabaseConnection,
    name: &str,
    color: &str,
    target: f64,
) -> Result<entities::bucket::Model> {
    bucket::create_bucket(db, BucketDetails::new(name, color).with_target(target, None)).await
}

/// Sets up a complete test environment with an empty "Vacation" bucket.
/// Returns (db, bucket) for common test scenarios.
pub async fn setup_with_bucket() -> Result<(DatabaseConnection, entities::bucket::Model)> {
    let db = setup_test_db().await?;
    let bucket = create_test_bucket(&db, "Vacation").await?;
    Ok((db, bucket))
}

/// An income against the free balance, timestamped now.
pub fn income(amount: f64) -> NewTransaction {
    NewTransaction::income(amount)
}

/// An expense against the free balance, timestamped now.
pub fn expense(amount: f64) -> NewTransaction {
    NewTransaction::expense(amount)
}
