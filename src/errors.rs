//! Unified error type for the ledger engine.
//!
//! Validation errors (`InvalidAmount`, `InvalidName`, `InvalidTransfer`,
//! `InsufficientFunds`, `BucketNotFound`) are returned to the immediate caller and
//! never retried. Structural errors (`SchemaMigration`, `StorageUnavailable`) are
//! fatal: the process must not keep running against a store in that state.

use crate::schema::catalog::Rule;
use sea_orm::DbErr;
use thiserror::Error;

/// All errors the ledger engine can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// Amount is zero, negative, non-finite or could not be parsed.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected value as the caller supplied it
        amount: String,
    },

    /// The write would drive a bucket or the free balance below zero.
    #[error("Insufficient funds ({rule}): available {available:.2}, required {required:.2}")]
    InsufficientFunds {
        /// The consistency rule that rejected the write
        rule: Rule,
        /// Balance the rule checked against
        available: f64,
        /// Amount the write needed
        required: f64,
    },

    /// Bucket name is empty after trimming.
    #[error("Invalid bucket name: {name:?}")]
    InvalidName {
        /// The rejected name
        name: String,
    },

    /// A transfer was requested without a bucket on the other side.
    #[error("Invalid transfer: {message}")]
    InvalidTransfer {
        /// What was wrong with the request
        message: String,
    },

    /// Bucket does not exist or has been soft-deleted.
    #[error("Bucket not found: {id}")]
    BucketNotFound {
        /// The requested bucket id
        id: i64,
    },

    /// Bringing the schema up to date failed; the run was rolled back.
    #[error("Schema migration failed at version {version} ({step}): {message}")]
    SchemaMigration {
        /// Version being applied when the failure happened
        version: i32,
        /// Name of the delta or provisioning step
        step: String,
        /// Underlying cause
        message: String,
    },

    /// The underlying store could not be opened.
    #[error("Storage unavailable at {url}: {message}")]
    StorageUnavailable {
        /// Connection URL that failed
        url: String,
        /// Underlying cause
        message: String,
    },

    /// Settings file could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Pass-through database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Pass-through I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for errors the application cannot recover from without a restart.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SchemaMigration { .. } | Self::StorageUnavailable { .. }
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
