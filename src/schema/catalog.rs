//! Schema catalog - the versioned definition of every structural object.
//!
//! This module is pure data. The migrator interprets [`PROVISION`] and [`DELTAS`],
//! the reset utility runs [`TEARDOWN`], and the consistency engine reports
//! violations using the [`RULES`] table. Every statement is safe to re-apply.

use std::fmt;

/// Schema version a fully migrated store is at.
pub const CURRENT_VERSION: i32 = 6;

/// A named, idempotent creation statement.
#[derive(Debug, Clone, Copy)]
pub struct SchemaObject {
    /// Object name, used in logs and migration errors
    pub name: &'static str,
    /// `CREATE ... IF NOT EXISTS` statement
    pub sql: &'static str,
}

/// One step of a delta.
#[derive(Debug, Clone, Copy)]
pub enum DeltaStep {
    /// Run the statement as is. Must be idempotent.
    Execute(&'static str),
    /// Add a column unless the table already has it. SQLite has no
    /// `ADD COLUMN IF NOT EXISTS`, so the migrator checks first.
    AddColumn {
        /// Table to alter
        table: &'static str,
        /// Column name
        column: &'static str,
        /// Column definition following the name
        definition: &'static str,
    },
}

/// Structural change registered for one schema version.
#[derive(Debug, Clone, Copy)]
pub struct Delta {
    /// Version the store is at once this delta has been applied
    pub version: i32,
    /// Stable name, reported in logs and errors
    pub name: &'static str,
    /// Steps, applied in order
    pub steps: &'static [DeltaStep],
}

/// Current `buckets` shape.
pub const CREATE_BUCKETS: &str = "CREATE TABLE IF NOT EXISTS buckets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    balance REAL NOT NULL,
    color TEXT NOT NULL,
    target_amount REAL CHECK (target_amount IS NULL OR target_amount > 0),
    target_date TEXT,
    visible INTEGER NOT NULL DEFAULT 1 CHECK (visible IN (0, 1))
)";

/// Current `transactions` shape.
pub const CREATE_TRANSACTIONS: &str = "CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL CHECK (kind IN ('expense', 'income')),
    amount REAL NOT NULL CHECK (amount > 0),
    balance_snapshot REAL NOT NULL,
    description TEXT,
    timestamp TEXT NOT NULL,
    bucket_id INTEGER REFERENCES buckets (id),
    is_transfer INTEGER NOT NULL DEFAULT 0 CHECK (is_transfer IN (0, 1))
)";

/// Single-row version marker.
pub const CREATE_SCHEMA_VERSION: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    updated_at TEXT NOT NULL
)";

const CREATE_TIMELINE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_transactions_timeline
    ON transactions (timestamp DESC, id DESC)";

const CREATE_BUCKET_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_transactions_bucket ON transactions (bucket_id)";

// Shapes as they were before visibility and transfers existed.
const CREATE_BASE_BUCKETS: &str = "CREATE TABLE IF NOT EXISTS buckets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    balance REAL NOT NULL,
    color TEXT NOT NULL,
    target_amount REAL,
    target_date TEXT
)";

const CREATE_BASE_TRANSACTIONS: &str = "CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL CHECK (kind IN ('expense', 'income')),
    amount REAL NOT NULL CHECK (amount > 0),
    balance_snapshot REAL NOT NULL,
    description TEXT,
    timestamp TEXT NOT NULL,
    bucket_id INTEGER REFERENCES buckets (id)
)";

/// Trigger names used by stores that enforced the balance rules in SQL.
pub const LEGACY_TRIGGERS: &[&str] = &[
    "check_bucket_balance_before_insert",
    "check_balance_before_insert",
    "update_bucket_balance_after_insert",
    "handle_bucket_deletion",
];

/// Objects created on a fresh install, already at [`CURRENT_VERSION`].
pub const PROVISION: &[SchemaObject] = &[
    SchemaObject {
        name: "buckets",
        sql: CREATE_BUCKETS,
    },
    SchemaObject {
        name: "transactions",
        sql: CREATE_TRANSACTIONS,
    },
    SchemaObject {
        name: "schema_version",
        sql: CREATE_SCHEMA_VERSION,
    },
    SchemaObject {
        name: "idx_transactions_timeline",
        sql: CREATE_TIMELINE_INDEX,
    },
    SchemaObject {
        name: "idx_transactions_bucket",
        sql: CREATE_BUCKET_INDEX,
    },
];

/// Incremental changes, in ascending version order.
pub const DELTAS: &[Delta] = &[
    Delta {
        version: 1,
        name: "create_base_tables",
        steps: &[
            DeltaStep::Execute(CREATE_BASE_BUCKETS),
            DeltaStep::Execute(CREATE_BASE_TRANSACTIONS),
            DeltaStep::Execute(CREATE_SCHEMA_VERSION),
        ],
    },
    Delta {
        version: 2,
        name: "add_bucket_visibility",
        steps: &[DeltaStep::AddColumn {
            table: "buckets",
            column: "visible",
            definition: "INTEGER NOT NULL DEFAULT 1 CHECK (visible IN (0, 1))",
        }],
    },
    Delta {
        version: 3,
        name: "add_transfer_flag",
        steps: &[DeltaStep::AddColumn {
            table: "transactions",
            column: "is_transfer",
            definition: "INTEGER NOT NULL DEFAULT 0 CHECK (is_transfer IN (0, 1))",
        }],
    },
    Delta {
        version: 4,
        name: "drop_write_triggers",
        steps: &[
            DeltaStep::Execute("DROP TRIGGER IF EXISTS check_bucket_balance_before_insert"),
            DeltaStep::Execute("DROP TRIGGER IF EXISTS check_balance_before_insert"),
            DeltaStep::Execute("DROP TRIGGER IF EXISTS update_bucket_balance_after_insert"),
            DeltaStep::Execute("DROP TRIGGER IF EXISTS handle_bucket_deletion"),
        ],
    },
    Delta {
        version: 5,
        name: "add_history_indexes",
        steps: &[
            DeltaStep::Execute(CREATE_TIMELINE_INDEX),
            DeltaStep::Execute(CREATE_BUCKET_INDEX),
        ],
    },
    Delta {
        version: 6,
        name: "rebuild_bucket_balances",
        steps: &[DeltaStep::Execute(
            "UPDATE buckets SET balance = ROUND(COALESCE((
                SELECT SUM(CASE t.kind WHEN 'income' THEN t.amount ELSE -t.amount END)
                FROM transactions t
                WHERE t.bucket_id = buckets.id
            ), 0), 2)",
        )],
    },
];

/// Drops every structural object, version marker included.
pub const TEARDOWN: &[&str] = &[
    "DROP TRIGGER IF EXISTS check_bucket_balance_before_insert",
    "DROP TRIGGER IF EXISTS check_balance_before_insert",
    "DROP TRIGGER IF EXISTS update_bucket_balance_after_insert",
    "DROP TRIGGER IF EXISTS handle_bucket_deletion",
    "DROP INDEX IF EXISTS idx_transactions_timeline",
    "DROP INDEX IF EXISTS idx_transactions_bucket",
    "DROP TABLE IF EXISTS transactions",
    "DROP TABLE IF EXISTS buckets",
    "DROP TABLE IF EXISTS schema_version",
];

/// Identifies a balance-consistency rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Expense against a bucket may not exceed its balance
    BucketExpense,
    /// Expense without a bucket may not exceed the free balance
    FreeBalanceExpense,
    /// Transfer into a bucket may not exceed the free balance
    TransferIntoBucket,
    /// Accepted bucket transactions move the bucket's cached balance
    BucketBalanceUpdate,
    /// Hiding a funded bucket sweeps its balance back to the free pool
    SoftDeleteSweep,
}

/// When a rule is evaluated relative to the write it guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePhase {
    /// Validation; a failure rejects the write
    BeforeInsert,
    /// Propagation after a transaction is accepted
    AfterInsert,
    /// Side effect of hiding a bucket
    AfterSoftDelete,
}

/// Declarative description of a rule.
#[derive(Debug, Clone, Copy)]
pub struct ConsistencyRule {
    /// Which rule
    pub rule: Rule,
    /// Stable name
    pub name: &'static str,
    /// Evaluation phase
    pub phase: RulePhase,
    /// Human readable statement of the rule
    pub description: &'static str,
}

/// Balance-consistency rules, indexed by [`Rule`].
pub const RULES: &[ConsistencyRule] = &[
    ConsistencyRule {
        rule: Rule::BucketExpense,
        name: "bucket_expense",
        phase: RulePhase::BeforeInsert,
        description: "expense with a bucket: bucket.balance - amount >= 0",
    },
    ConsistencyRule {
        rule: Rule::FreeBalanceExpense,
        name: "free_balance_expense",
        phase: RulePhase::BeforeInsert,
        description: "expense without a bucket: free balance - amount >= 0",
    },
    ConsistencyRule {
        rule: Rule::TransferIntoBucket,
        name: "transfer_into_bucket",
        phase: RulePhase::BeforeInsert,
        description: "transfer income into a bucket: free balance - amount >= 0",
    },
    ConsistencyRule {
        rule: Rule::BucketBalanceUpdate,
        name: "bucket_balance_update",
        phase: RulePhase::AfterInsert,
        description: "bucket.balance += amount for income, -= amount for expense",
    },
    ConsistencyRule {
        rule: Rule::SoftDeleteSweep,
        name: "soft_delete_sweep",
        phase: RulePhase::AfterSoftDelete,
        description: "hiding a bucket with balance > 0 records one transfer expense of that balance",
    },
];

impl Rule {
    /// Catalog entry for this rule.
    #[must_use]
    pub fn definition(self) -> &'static ConsistencyRule {
        // RULES lists every variant, in declaration order
        &RULES[self as usize]
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.definition().name)
    }
}

/// Deltas that still have to run for a store at `stored_version`.
pub fn pending_deltas(stored_version: i32) -> impl Iterator<Item = &'static Delta> {
    DELTAS
        .iter()
        .filter(move |delta| delta.version > stored_version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_ascend_and_end_at_current_version() {
        let versions: Vec<i32> = DELTAS.iter().map(|d| d.version).collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(versions.last().copied(), Some(CURRENT_VERSION));
    }

    #[test]
    fn test_pending_deltas_skip_applied_versions() {
        let names: Vec<&str> = pending_deltas(3).map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "drop_write_triggers",
                "add_history_indexes",
                "rebuild_bucket_balances"
            ]
        );
        assert_eq!(pending_deltas(CURRENT_VERSION).count(), 0);
        assert_eq!(pending_deltas(0).count(), DELTAS.len());
    }

    #[test]
    fn test_rule_table_matches_variants() {
        for rule in [
            Rule::BucketExpense,
            Rule::FreeBalanceExpense,
            Rule::TransferIntoBucket,
            Rule::BucketBalanceUpdate,
            Rule::SoftDeleteSweep,
        ] {
            assert_eq!(rule.definition().rule, rule);
        }
        assert_eq!(Rule::TransferIntoBucket.to_string(), "transfer_into_bucket");
        assert_eq!(Rule::SoftDeleteSweep.definition().phase, RulePhase::AfterSoftDelete);
    }

    #[test]
    fn test_every_trigger_is_dropped_by_teardown() {
        for trigger in LEGACY_TRIGGERS {
            let drop = format!("DROP TRIGGER IF EXISTS {trigger}");
            assert!(TEARDOWN.contains(&drop.as_str()), "missing {drop}");
        }
    }

    #[test]
    fn test_provision_statements_are_idempotent() {
        assert!(PROVISION.iter().all(|o| o.sql.contains("IF NOT EXISTS")));
    }
}
