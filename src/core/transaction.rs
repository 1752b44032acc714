//! Transaction business logic - recording and querying ledger entries.
//!
//! Recording a transaction validates the amount, resolves the referenced bucket and
//! hands the write to the consistency engine, all inside one database transaction:
//! validation, insert and bucket-balance update either all happen or none do.
//! Transactions are never edited or deleted afterwards.

use crate::{
    core::{amount::validate_amount, bucket::find_visible, consistency},
    entities::{Transaction, TransactionKind, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument};

/// A transaction as requested by a caller, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// Expense or income
    pub kind: TransactionKind,
    /// Requested amount; must be positive
    pub amount: f64,
    /// Optional description
    pub description: Option<String>,
    /// When the transaction happened
    pub timestamp: DateTime<Utc>,
    /// Bucket to book against, `None` for the free balance
    pub bucket_id: Option<i64>,
    /// Money moved between the free balance and `bucket_id`
    pub is_transfer: bool,
}

impl NewTransaction {
    /// A transaction of `kind` for `amount`, timestamped now, against the free balance.
    #[must_use]
    pub fn new(kind: TransactionKind, amount: f64) -> Self {
        Self {
            kind,
            amount,
            description: None,
            timestamp: Utc::now(),
            bucket_id: None,
            is_transfer: false,
        }
    }

    /// Shorthand for an income.
    #[must_use]
    pub fn income(amount: f64) -> Self {
        Self::new(TransactionKind::Income, amount)
    }

    /// Shorthand for an expense.
    #[must_use]
    pub fn expense(amount: f64) -> Self {
        Self::new(TransactionKind::Expense, amount)
    }

    /// Books the transaction against a bucket.
    #[must_use]
    pub const fn in_bucket(mut self, bucket_id: i64) -> Self {
        self.bucket_id = Some(bucket_id);
        self
    }

    /// Marks the transaction as a transfer between the free balance and its bucket.
    #[must_use]
    pub const fn as_transfer(mut self) -> Self {
        self.is_transfer = true;
        self
    }

    /// Attaches a free-text description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Overrides the timestamp, e.g. for back-dated entries.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Records a transaction, enforcing every balance rule.
///
/// # Errors
/// - [`Error::InvalidAmount`] if the amount is not positive and finite
/// - [`Error::InvalidTransfer`] if a transfer has no bucket
/// - [`Error::BucketNotFound`] if the bucket does not exist or is hidden
/// - [`Error::InsufficientFunds`] if the write would make a balance negative
#[instrument(skip(db, new), fields(kind = ?new.kind, bucket_id = ?new.bucket_id))]
pub async fn insert_transaction(
    db: &DatabaseConnection,
    new: NewTransaction,
) -> Result<transaction::Model> {
    let amount = validate_amount(new.amount)?;
    if new.is_transfer && new.bucket_id.is_none() {
        return Err(Error::InvalidTransfer {
            message: "a transfer needs a bucket to move money into or out of".to_string(),
        });
    }
    let new = NewTransaction { amount, ..new };

    // Use a transaction to ensure atomicity
    let txn = db.begin().await?;

    let bucket = match new.bucket_id {
        Some(id) => Some(find_visible(&txn, id).await?),
        None => None,
    };

    let recorded = consistency::record(&txn, &new, bucket.as_ref()).await?;

    txn.commit().await?;

    info!(
        transaction_id = recorded.id,
        amount = recorded.amount,
        snapshot = recorded.balance_snapshot,
        "Recorded transaction"
    );
    Ok(recorded)
}

/// Lists transactions newest first (timestamp, then id).
///
/// `bucket_id` restricts the list to one bucket, hidden ones included. A `limit` of
/// `None` or `Some(0)` returns everything.
#[instrument(skip(db))]
pub async fn list_transactions(
    db: &DatabaseConnection,
    bucket_id: Option<i64>,
    limit: Option<u64>,
) -> Result<Vec<transaction::Model>> {
    let mut query = Transaction::find()
        .order_by_desc(transaction::Column::Timestamp)
        .order_by_desc(transaction::Column::Id);
    if let Some(bucket_id) = bucket_id {
        query = query.filter(transaction::Column::BucketId.eq(bucket_id));
    }
    if let Some(limit) = limit.filter(|&limit| limit > 0) {
        query = query.limit(limit);
    }

    let transactions = query.all(db).await?;
    debug!("Fetched {} transactions.", transactions.len());
    Ok(transactions)
}

/// Retrieves a specific transaction by its unique ID.
pub async fn get_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}
