//! Schema layer - versioned catalog, migration runner and reset utilities.

/// Versioned definitions of tables, indexes, deltas and consistency rules
pub mod catalog;
/// Startup migration from any older store to the current version
pub mod migrator;
/// Destructive reset and store export
pub mod reset;

pub use catalog::{CURRENT_VERSION, Rule};
pub use migrator::{MigrationOutcome, SchemaState, migrate};
pub use reset::{export_database, wipe_all};
