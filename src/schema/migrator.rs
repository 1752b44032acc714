//! Migration runner - brings a persisted store up to [`CURRENT_VERSION`].
//!
//! A fresh store is provisioned directly at the current version. An older store gets
//! only the deltas registered above its stored version, and the new version is written
//! in the same database transaction as the last delta. Any failure rolls the whole run
//! back and is reported as [`Error::SchemaMigration`].

use crate::{
    entities::{SchemaVersion, schema_version},
    errors::{Error, Result},
    schema::catalog::{self, CURRENT_VERSION, Delta, DeltaStep},
};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Set, Statement,
    TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

/// Lifecycle state of a store's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// No ledger tables exist yet
    Uninitialized,
    /// Ledger tables exist; the value is the stored version (0 when unversioned)
    Versioned(i32),
}

/// What a migration run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// State found before the run
    pub from: SchemaState,
    /// Version the store is at afterwards
    pub to: i32,
    /// Provisioned objects or applied deltas, in order
    pub applied: Vec<&'static str>,
}

impl MigrationOutcome {
    /// `true` when the store was already current and nothing ran.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

fn failure(version: i32, step: &str, err: &DbErr) -> Error {
    Error::SchemaMigration {
        version,
        step: step.to_string(),
        message: err.to_string(),
    }
}

/// Brings the store behind `db` to [`CURRENT_VERSION`].
///
/// Safe to call on every startup: a current store is left untouched.
///
/// # Errors
/// Returns [`Error::SchemaMigration`] if the stored version is newer than this build
/// supports or if any statement fails. Nothing from the failed run is kept.
#[instrument(skip(db))]
pub async fn migrate(db: &DatabaseConnection) -> Result<MigrationOutcome> {
    let txn = db
        .begin()
        .await
        .map_err(|e| failure(CURRENT_VERSION, "begin", &e))?;

    let from = detect_state(&txn)
        .await
        .map_err(|e| failure(CURRENT_VERSION, "detect_state", &e))?;
    debug!(?from, "Detected schema state");

    let applied = match from {
        SchemaState::Uninitialized => provision(&txn).await?,
        SchemaState::Versioned(stored) if stored == CURRENT_VERSION => Vec::new(),
        SchemaState::Versioned(stored) if stored > CURRENT_VERSION => {
            warn!(
                stored,
                supported = CURRENT_VERSION,
                "Store was written by a newer schema"
            );
            return Err(Error::SchemaMigration {
                version: stored,
                step: "version_check".to_string(),
                message: format!(
                    "stored version {stored} is newer than supported version {CURRENT_VERSION}"
                ),
            });
        }
        SchemaState::Versioned(stored) => {
            let mut applied = Vec::new();
            for delta in catalog::pending_deltas(stored) {
                apply_delta(&txn, delta)
                    .await
                    .map_err(|e| failure(delta.version, delta.name, &e))?;
                info!(
                    version = delta.version,
                    name = delta.name,
                    "Applied schema delta"
                );
                applied.push(delta.name);
            }
            applied
        }
    };

    if !applied.is_empty() {
        write_version(&txn, CURRENT_VERSION)
            .await
            .map_err(|e| failure(CURRENT_VERSION, "write_version", &e))?;
    }

    txn.commit()
        .await
        .map_err(|e| failure(CURRENT_VERSION, "commit", &e))?;

    if applied.is_empty() {
        debug!("Schema already at version {}", CURRENT_VERSION);
    } else {
        info!(
            ?from,
            to = CURRENT_VERSION,
            steps = applied.len(),
            "Schema brought up to date"
        );
    }

    Ok(MigrationOutcome {
        from,
        to: CURRENT_VERSION,
        applied,
    })
}

/// Reads the schema state without changing anything.
pub async fn schema_state(db: &DatabaseConnection) -> Result<SchemaState> {
    detect_state(db).await.map_err(Into::into)
}

async fn provision<C: ConnectionTrait>(conn: &C) -> Result<Vec<&'static str>> {
    let mut applied = Vec::with_capacity(catalog::PROVISION.len());
    for object in catalog::PROVISION {
        conn.execute_unprepared(object.sql)
            .await
            .map_err(|e| failure(CURRENT_VERSION, object.name, &e))?;
        applied.push(object.name);
    }
    info!(
        version = CURRENT_VERSION,
        "Provisioned fresh store at current version"
    );
    Ok(applied)
}

async fn apply_delta<C: ConnectionTrait>(
    conn: &C,
    delta: &Delta,
) -> std::result::Result<(), DbErr> {
    for step in delta.steps {
        match *step {
            DeltaStep::Execute(sql) => {
                conn.execute_unprepared(sql).await?;
            }
            DeltaStep::AddColumn {
                table,
                column,
                definition,
            } => {
                if column_exists(conn, table, column).await? {
                    debug!(table, column, "Column already present, skipping");
                } else {
                    conn.execute_unprepared(&format!(
                        "ALTER TABLE {table} ADD COLUMN {column} {definition}"
                    ))
                    .await?;
                }
            }
        }
    }
    Ok(())
}

async fn detect_state<C: ConnectionTrait>(conn: &C) -> std::result::Result<SchemaState, DbErr> {
    if !table_exists(conn, "buckets").await? {
        return Ok(SchemaState::Uninitialized);
    }
    if !table_exists(conn, "schema_version").await? {
        return Ok(SchemaState::Versioned(0));
    }
    let version = SchemaVersion::find_by_id(schema_version::MARKER_ID)
        .one(conn)
        .await?
        .map_or(0, |marker| marker.version);
    Ok(SchemaState::Versioned(version))
}

async fn write_version<C: ConnectionTrait>(
    conn: &C,
    version: i32,
) -> std::result::Result<(), DbErr> {
    let now = chrono::Utc::now();
    if let Some(existing) = SchemaVersion::find_by_id(schema_version::MARKER_ID)
        .one(conn)
        .await?
    {
        let mut marker: schema_version::ActiveModel = existing.into();
        marker.version = Set(version);
        marker.updated_at = Set(now);
        marker.update(conn).await?;
    } else {
        schema_version::ActiveModel {
            id: Set(schema_version::MARKER_ID),
            version: Set(version),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn count<C: ConnectionTrait>(
    conn: &C,
    sql: &str,
    values: Vec<sea_orm::Value>,
) -> std::result::Result<i64, DbErr> {
    let backend = conn.get_database_backend();
    let row = conn
        .query_one(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    match row {
        Some(row) => row.try_get::<i64>("", "count"),
        None => Ok(0),
    }
}

pub(crate) async fn table_exists<C: ConnectionTrait>(
    conn: &C,
    table: &str,
) -> std::result::Result<bool, DbErr> {
    let found = count(
        conn,
        "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
        vec![table.into()],
    )
    .await?;
    Ok(found > 0)
}

async fn column_exists<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    column: &str,
) -> std::result::Result<bool, DbErr> {
    let found = count(
        conn,
        "SELECT COUNT(*) AS count FROM pragma_table_info(?) WHERE name = ?",
        vec![table.into(), column.into()],
    )
    .await?;
    Ok(found > 0)
}
