//! Core business logic - framework-agnostic ledger operations.

/// Money amount parsing and rounding
pub mod amount;
/// Total, allocated and free balance queries
pub mod balance;
/// Bucket lifecycle: create, edit, hide, list, seed
pub mod bucket;
/// Balance rules applied to every write
pub mod consistency;
/// Histories, chart series and goal reports
pub mod report;
/// Recording and listing transactions
pub mod transaction;
