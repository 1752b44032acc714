//! Bucket business logic - creating, editing, hiding and listing piggy banks.
//!
//! A bucket's balance is never written here directly: it only moves through recorded
//! transactions (see [`crate::core::consistency`]). Hiding a bucket is a soft delete
//! that returns its money to the free balance through a single sweep transaction.

use crate::{
    config::settings::BucketSeed,
    core::{amount::validate_amount, consistency},
    entities::{Bucket, bucket, transaction},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument};

/// Structural attributes of a bucket, everything except its balance.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketDetails {
    /// Display name, trimmed before storing
    pub name: String,
    /// Display color
    pub color: String,
    /// Optional savings goal
    pub target_amount: Option<f64>,
    /// Optional goal date
    pub target_date: Option<NaiveDate>,
}

impl BucketDetails {
    /// Details without a savings goal.
    #[must_use]
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            target_amount: None,
            target_date: None,
        }
    }

    /// Sets the savings goal.
    #[must_use]
    pub const fn with_target(mut self, amount: f64, date: Option<NaiveDate>) -> Self {
        self.target_amount = Some(amount);
        self.target_date = date;
        self
    }

    /// Trims the name and rounds the target, rejecting unusable values.
    fn validated(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidName { name: self.name });
        }
        let target_amount = self.target_amount.map(validate_amount).transpose()?;
        Ok(Self {
            name,
            target_amount,
            ..self
        })
    }
}

/// Result of hiding a bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftDeleteOutcome {
    /// The bucket after hiding: invisible, balance 0
    pub bucket: bucket::Model,
    /// Compensating transfer, present when the bucket held money
    pub sweep: Option<transaction::Model>,
}

/// Finds a visible bucket by id.
///
/// Hidden buckets are reported as missing so no new money can flow into or out of them.
pub(crate) async fn find_visible<C>(conn: &C, bucket_id: i64) -> Result<bucket::Model>
where
    C: ConnectionTrait,
{
    Bucket::find_by_id(bucket_id)
        .filter(bucket::Column::Visible.eq(true))
        .one(conn)
        .await?
        .ok_or(Error::BucketNotFound { id: bucket_id })
}

async fn find_visible_by_name<C>(conn: &C, name: &str) -> Result<Option<bucket::Model>>
where
    C: ConnectionTrait,
{
    Bucket::find()
        .filter(bucket::Column::Name.eq(name))
        .filter(bucket::Column::Visible.eq(true))
        .one(conn)
        .await
        .map_err(Into::into)
}

async fn insert_bucket<C>(conn: &C, details: BucketDetails) -> Result<bucket::Model>
where
    C: ConnectionTrait,
{
    let bucket = bucket::ActiveModel {
        name: Set(details.name),
        balance: Set(0.0),
        color: Set(details.color),
        target_amount: Set(details.target_amount),
        target_date: Set(details.target_date),
        visible: Set(true),
        ..Default::default()
    };
    Ok(bucket.insert(conn).await?)
}

/// Creates a new, empty and visible bucket.
///
/// # Errors
/// - [`Error::InvalidName`] if the trimmed name is empty
/// - [`Error::InvalidAmount`] if a target is given and is not positive
#[instrument(skip(db, details), fields(name = %details.name))]
pub async fn create_bucket(
    db: &DatabaseConnection,
    details: BucketDetails,
) -> Result<bucket::Model> {
    let details = details.validated()?;
    let created = insert_bucket(db, details).await?;
    info!(bucket_id = created.id, "Created bucket");
    Ok(created)
}

/// Edits a visible bucket's name, color and goal. The balance is left untouched.
#[instrument(skip(db, details))]
pub async fn update_bucket(
    db: &DatabaseConnection,
    bucket_id: i64,
    details: BucketDetails,
) -> Result<bucket::Model> {
    let details = details.validated()?;
    let existing = find_visible(db, bucket_id).await?;

    let mut active: bucket::ActiveModel = existing.into();
    active.name = Set(details.name);
    active.color = Set(details.color);
    active.target_amount = Set(details.target_amount);
    active.target_date = Set(details.target_date);
    let updated = active.update(db).await?;

    debug!(bucket_id, "Updated bucket details");
    Ok(updated)
}

/// Hides a bucket and sweeps its balance back to the free balance.
///
/// Both steps share one database transaction: either the bucket is hidden and its
/// money returned, or nothing changes.
#[instrument(skip(db))]
pub async fn soft_delete_bucket(
    db: &DatabaseConnection,
    bucket_id: i64,
) -> Result<SoftDeleteOutcome> {
    let txn = db.begin().await?;

    let prior = find_visible(&txn, bucket_id).await?;
    let mut active: bucket::ActiveModel = prior.clone().into();
    active.visible = Set(false);
    active.update(&txn).await?;

    let sweep = consistency::sweep(&txn, &prior).await?;

    let bucket = Bucket::find_by_id(bucket_id)
        .one(&txn)
        .await?
        .ok_or(Error::BucketNotFound { id: bucket_id })?;

    txn.commit().await?;

    info!(
        bucket_id,
        swept = sweep.as_ref().map_or(0.0, |t| t.amount),
        "Hid bucket"
    );
    Ok(SoftDeleteOutcome { bucket, sweep })
}

/// Retrieves a visible bucket by id.
///
/// # Errors
/// [`Error::BucketNotFound`] if the bucket does not exist or was hidden.
pub async fn get_bucket(db: &DatabaseConnection, bucket_id: i64) -> Result<bucket::Model> {
    find_visible(db, bucket_id).await
}

/// Lists buckets alphabetically, optionally including hidden ones.
#[instrument(skip(db))]
pub async fn list_buckets(
    db: &DatabaseConnection,
    include_hidden: bool,
) -> Result<Vec<bucket::Model>> {
    let mut query = Bucket::find()
        .order_by_asc(bucket::Column::Name)
        .order_by_asc(bucket::Column::Id);
    if !include_hidden {
        query = query.filter(bucket::Column::Visible.eq(true));
    }
    let buckets = query.all(db).await?;
    debug!("Fetched {} buckets.", buckets.len());
    Ok(buckets)
}

/// Creates the configured buckets that have no visible namesake yet.
///
/// Runs in a single transaction and returns the number of buckets created.
#[instrument(skip(db, seeds))]
pub async fn seed_initial_buckets(
    db: &DatabaseConnection,
    seeds: &[BucketSeed],
) -> Result<usize> {
    let txn = db.begin().await?;
    let mut created = 0;

    for seed in seeds {
        let details = seed.to_details().validated()?;
        if find_visible_by_name(&txn, &details.name).await?.is_some() {
            debug!(name = %details.name, "Bucket already exists, skipping");
            continue;
        }
        let bucket = insert_bucket(&txn, details).await?;
        info!(bucket_id = bucket.id, name = %bucket.name, "Seeded bucket");
        created += 1;
    }

    txn.commit().await?;
    Ok(created)
}
