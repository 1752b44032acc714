//! Report generation business logic.
//!
//! Bucket histories with running balances, balance-over-time series for charts and
//! per-bucket goal progress. All functions return plain data; formatting is left to
//! whatever presents it.

use crate::{
    core::{amount::round_to_cents, bucket, transaction::list_transactions},
    entities::{Bucket, Transaction, bucket as bucket_entity, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, prelude::*};
use tracing::instrument;

/// Number of transactions a bucket report includes when no limit is given.
pub const DEFAULT_RECENT_LIMIT: u64 = 10;

/// One bucket transaction together with the bucket balance right after it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// The recorded transaction
    pub transaction: transaction::Model,
    /// Bucket balance after this transaction
    pub running_balance: f64,
}

/// A single point of a chart series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// When the value was reached
    pub timestamp: DateTime<Utc>,
    /// Balance at that point
    pub value: f64,
}

/// Running balance of one bucket over time.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSeries {
    /// The bucket the series belongs to
    pub bucket: bucket_entity::Model,
    /// Chronological running balance
    pub points: Vec<SeriesPoint>,
}

/// Goal progress and recent activity of a bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketReport {
    /// The bucket being reported on
    pub bucket: bucket_entity::Model,
    /// Share of the target already saved (0-100), `None` without a target
    pub progress_percent: Option<f64>,
    /// Money still missing to reach the target, `None` without a target
    pub amount_remaining: Option<f64>,
    /// Most recent transactions, newest first
    pub recent_transactions: Vec<transaction::Model>,
}

/// Chronological transactions of one bucket (timestamp, then id).
async fn chronological_history(
    db: &DatabaseConnection,
    bucket_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::BucketId.eq(bucket_id))
        .order_by_asc(transaction::Column::Timestamp)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Replays transactions oldest to newest, accumulating the bucket balance.
fn replay(transactions: Vec<transaction::Model>) -> Vec<HistoryEntry> {
    let mut running = 0.0;
    transactions
        .into_iter()
        .map(|transaction| {
            running = round_to_cents(running + transaction.kind.signed(transaction.amount));
            HistoryEntry {
                transaction,
                running_balance: running,
            }
        })
        .collect()
}

/// Bucket-local history with a running balance per entry, newest first.
///
/// Hidden buckets are accepted so their past stays reachable.
///
/// # Errors
/// [`Error::BucketNotFound`] if no bucket with this id was ever created.
#[instrument(skip(db))]
pub async fn bucket_history(db: &DatabaseConnection, bucket_id: i64) -> Result<Vec<HistoryEntry>> {
    Bucket::find_by_id(bucket_id)
        .one(db)
        .await?
        .ok_or(Error::BucketNotFound { id: bucket_id })?;

    let mut history = replay(chronological_history(db, bucket_id).await?);
    history.reverse();
    Ok(history)
}

/// Total balance snapshots in chronological order.
#[instrument(skip(db))]
pub async fn balance_series(db: &DatabaseConnection) -> Result<Vec<SeriesPoint>> {
    let transactions = Transaction::find()
        .order_by_asc(transaction::Column::Timestamp)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await?;

    Ok(transactions
        .into_iter()
        .map(|t| SeriesPoint {
            timestamp: t.timestamp,
            value: t.balance_snapshot,
        })
        .collect())
}

/// Running balance series for every visible bucket, in bucket list order.
#[instrument(skip(db))]
pub async fn bucket_series(db: &DatabaseConnection) -> Result<Vec<BucketSeries>> {
    let mut series = Vec::new();
    for bucket in bucket::list_buckets(db, false).await? {
        let points = replay(chronological_history(db, bucket.id).await?)
            .into_iter()
            .map(|entry| SeriesPoint {
                timestamp: entry.transaction.timestamp,
                value: entry.running_balance,
            })
            .collect();
        series.push(BucketSeries { bucket, points });
    }
    Ok(series)
}

/// Generates a goal report for a visible bucket.
///
/// `transaction_limit` caps the recent transactions, [`DEFAULT_RECENT_LIMIT`] when `None`.
#[instrument(skip(db))]
pub async fn bucket_report(
    db: &DatabaseConnection,
    bucket_id: i64,
    transaction_limit: Option<u64>,
) -> Result<BucketReport> {
    let bucket = bucket::get_bucket(db, bucket_id).await?;
    let limit = transaction_limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let recent_transactions = list_transactions(db, Some(bucket_id), Some(limit)).await?;

    let progress_percent = bucket
        .target_amount
        .map(|target| calculate_progress(bucket.balance, target));
    let amount_remaining = bucket
        .target_amount
        .map(|target| round_to_cents((target - bucket.balance).max(0.0)));

    Ok(BucketReport {
        bucket,
        progress_percent,
        amount_remaining,
        recent_transactions,
    })
}

/// Share of `target` covered by `balance`, as a percentage clamped to 0-100.
///
/// A non-positive target yields 0.
#[must_use]
pub fn calculate_progress(balance: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }

    ((balance / target) * 100.0).clamp(0.0, 100.0)
}
