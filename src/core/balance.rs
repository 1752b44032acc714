//! Balance queries shared by the repository and the consistency engine.
//!
//! Total wealth is the snapshot of the most recently recorded transaction. The free
//! (unallocated) balance is that total minus everything sitting in visible buckets.

use crate::{
    core::amount::round_to_cents,
    entities::{Bucket, Transaction, bucket, transaction},
    errors::Result,
};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, QueryOrder, QuerySelect, prelude::*, sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, instrument};

/// Headline balances of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceSummary {
    /// Free balance plus all visible buckets
    pub total: f64,
    /// Sum of visible bucket balances
    pub allocated: f64,
    /// Money not allocated to any bucket
    pub free: f64,
}

/// Snapshot of the most recently recorded transaction, or 0 for an empty ledger.
///
/// Recording order (id) is used rather than the transaction timestamp so that a
/// back-dated entry cannot make an older snapshot the base of the next one.
pub async fn latest_snapshot<C>(conn: &C) -> Result<f64>
where
    C: ConnectionTrait,
{
    let latest = Transaction::find()
        .order_by_desc(transaction::Column::Id)
        .one(conn)
        .await?;
    Ok(latest.map_or(0.0, |t| t.balance_snapshot))
}

/// Sum of the cached balances of all visible buckets.
pub async fn allocated_balance<C>(conn: &C) -> Result<f64>
where
    C: ConnectionTrait,
{
    let total: Option<Option<f64>> = Bucket::find()
        .select_only()
        .column_as(Expr::col(bucket::Column::Balance).sum(), "total")
        .filter(bucket::Column::Visible.eq(true))
        .into_tuple()
        .one(conn)
        .await?;
    Ok(round_to_cents(total.flatten().unwrap_or(0.0)))
}

/// Free balance: latest snapshot minus the visible buckets' balances.
pub async fn free_balance<C>(conn: &C) -> Result<f64>
where
    C: ConnectionTrait,
{
    let latest = latest_snapshot(conn).await?;
    let allocated = allocated_balance(conn).await?;
    Ok(round_to_cents(latest - allocated))
}

/// Current free (unallocated) balance.
#[instrument(skip(db))]
pub async fn current_free_balance(db: &DatabaseConnection) -> Result<f64> {
    let free = free_balance(db).await?;
    debug!(free, "Computed free balance");
    Ok(free)
}

/// Total, allocated and free balance in one call.
#[instrument(skip(db))]
pub async fn balance_summary(db: &DatabaseConnection) -> Result<BalanceSummary> {
    let total = latest_snapshot(db).await?;
    let allocated = allocated_balance(db).await?;
    Ok(BalanceSummary {
        total,
        allocated,
        free: round_to_cents(total - allocated),
    })
}
