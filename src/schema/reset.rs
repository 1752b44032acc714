//! Reset and export utilities.
//!
//! `wipe_all` tears down every structural object so the next [`migrate`] provisions a
//! clean store. `export_database` writes a consistent copy of the live store to a file
//! for the platform layer to share; picking and copying files stays outside the engine.
//!
//! [`migrate`]: crate::schema::migrator::migrate

use crate::{
    errors::{Error, Result},
    schema::catalog,
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement, TransactionTrait};
use std::path::Path;
use tracing::{info, instrument, warn};

/// Drops all ledger tables, indexes, legacy triggers and the version marker.
///
/// Irreversible. Confirming the intent is the caller's job.
#[instrument(skip(db))]
pub async fn wipe_all(db: &DatabaseConnection) -> Result<()> {
    let txn = db.begin().await?;
    for statement in catalog::TEARDOWN {
        txn.execute_unprepared(statement).await?;
    }
    txn.commit().await?;
    warn!("Ledger store wiped; schema will be re-provisioned on next migration");
    Ok(())
}

/// Writes a consistent copy of the store to `dest` using `VACUUM INTO`.
///
/// # Errors
/// Returns [`Error::Io`] if `dest` already exists or no file was written (in-memory
/// stores), or a database error if SQLite cannot write the copy.
#[instrument(skip(db))]
pub async fn export_database(db: &DatabaseConnection, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("refusing to overwrite {}", dest.display()),
        )));
    }
    let target = dest.to_string_lossy().into_owned();
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "VACUUM INTO ?",
        vec![target.into()],
    ))
    .await?;

    // An in-memory store vacuums into another in-memory database
    if !dest.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("store is not file-backed, nothing written to {}", dest.display()),
        )));
    }
    info!("Exported ledger store to {}", dest.display());
    Ok(())
}
