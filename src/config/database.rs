//! Database configuration module.
//!
//! Resolves the database URL, opens the `SQLite` store and brings its schema up to
//! date. Tables are never created from entity definitions: the versioned catalog in
//! [`crate::schema`] owns the layout.

use crate::{
    config::settings::LedgerConfig,
    errors::{Error, Result},
    schema::migrator::migrate,
};
use sea_orm::{Database, DatabaseConnection};
use tracing::{info, instrument};

/// Store used when neither the environment nor the settings name one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://piggy_ledger.sqlite?mode=rwc";

fn resolve_database_url(from_env: Option<String>, config: &LedgerConfig) -> String {
    from_env
        .or_else(|| config.database_url.clone())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

/// Gets the database URL: `DATABASE_URL`, then the settings file, then the default.
#[must_use]
pub fn get_database_url(config: &LedgerConfig) -> String {
    resolve_database_url(std::env::var("DATABASE_URL").ok(), config)
}

/// Opens a connection to the store at `url`.
///
/// # Errors
/// [`Error::StorageUnavailable`] if the store cannot be opened.
pub async fn open_store(url: &str) -> Result<DatabaseConnection> {
    Database::connect(url)
        .await
        .map_err(|e| Error::StorageUnavailable {
            url: url.to_string(),
            message: e.to_string(),
        })
}

/// Opens the store and migrates it to the current schema version.
#[instrument]
pub async fn init_store(url: &str) -> Result<DatabaseConnection> {
    let db = open_store(url).await?;
    let outcome = migrate(&db).await?;
    info!(
        from = ?outcome.from,
        to = outcome.to,
        applied = outcome.applied.len(),
        "Store ready"
    );
    Ok(db)
}
