//! Balance-consistency engine.
//!
//! Every write that touches money passes through here, inside the caller's database
//! transaction:
//!
//! - before an insert, rules 1-3 reject anything that would drive a bucket or the free
//!   balance below zero ([`check_insert`]);
//! - after an accepted insert with a bucket, rule 4 moves the bucket's cached balance
//!   ([`apply_bucket_delta`]);
//! - hiding a funded bucket records exactly one compensating transfer, rule 5
//!   ([`sweep`]).
//!
//! Callers never compute snapshots or bucket balances themselves.

use crate::{
    core::{
        amount::round_to_cents,
        balance::{free_balance, latest_snapshot},
        transaction::NewTransaction,
    },
    entities::{Bucket, TransactionKind, bucket, transaction},
    errors::{Error, Result},
    schema::catalog::Rule,
};
use sea_orm::{ConnectionTrait, Set, prelude::*, sea_query::Expr};
use tracing::{debug, info, warn};

/// Description attached to the compensating transaction of a soft-delete.
pub const SWEEP_DESCRIPTION: &str = "Automatic transfer from deleted piggy bank";

fn reject(rule: Rule, available: f64, required: f64) -> Error {
    warn!(%rule, available, required, "Write rejected");
    Error::InsufficientFunds {
        rule,
        available,
        required,
    }
}

fn overflow(amount: f64) -> Error {
    warn!(amount, "Write rejected, balance would overflow");
    Error::InvalidAmount {
        amount: amount.to_string(),
    }
}

/// Rules 1-3: validates a candidate insert against current balances.
///
/// `bucket` must be the row referenced by `new.bucket_id`, read in the same database
/// transaction.
pub async fn check_insert<C>(
    conn: &C,
    new: &NewTransaction,
    bucket: Option<&bucket::Model>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    match (new.kind, bucket, new.is_transfer) {
        (TransactionKind::Expense, Some(bucket), _) => {
            if round_to_cents(bucket.balance - new.amount) < 0.0 {
                return Err(reject(Rule::BucketExpense, bucket.balance, new.amount));
            }
        }
        (TransactionKind::Expense, None, _) => {
            let free = free_balance(conn).await?;
            if round_to_cents(free - new.amount) < 0.0 {
                return Err(reject(Rule::FreeBalanceExpense, free, new.amount));
            }
        }
        (TransactionKind::Income, Some(_), true) => {
            let free = free_balance(conn).await?;
            if round_to_cents(free - new.amount) < 0.0 {
                return Err(reject(Rule::TransferIntoBucket, free, new.amount));
            }
        }
        (TransactionKind::Income, _, _) => {}
    }
    Ok(())
}

/// Snapshot to store on a new transaction.
///
/// Transfers only move money between the free balance and a bucket, so total wealth
/// stays where it was.
#[must_use]
pub fn next_snapshot(latest: f64, kind: TransactionKind, amount: f64, is_transfer: bool) -> f64 {
    if is_transfer {
        latest
    } else {
        round_to_cents(latest + kind.signed(amount))
    }
}

/// Rule 4: moves the bucket's cached balance by the transaction amount.
///
/// Returns the new balance.
pub async fn apply_bucket_delta<C>(
    conn: &C,
    bucket: &bucket::Model,
    kind: TransactionKind,
    amount: f64,
) -> Result<f64>
where
    C: ConnectionTrait,
{
    let new_balance = round_to_cents(bucket.balance + kind.signed(amount));
    if !new_balance.is_finite() {
        return Err(overflow(amount));
    }
    Bucket::update_many()
        .col_expr(bucket::Column::Balance, Expr::value(new_balance))
        .filter(bucket::Column::Id.eq(bucket.id))
        .exec(conn)
        .await?;
    debug!(
        bucket_id = bucket.id,
        from = bucket.balance,
        to = new_balance,
        "Bucket balance updated"
    );
    Ok(new_balance)
}

/// Validates, inserts and propagates one transaction.
///
/// `new.amount` must already be validated. Must run inside a database transaction so a
/// failure in any step leaves nothing behind.
pub async fn record<C>(
    conn: &C,
    new: &NewTransaction,
    bucket: Option<&bucket::Model>,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    check_insert(conn, new, bucket).await?;

    let latest = latest_snapshot(conn).await?;
    let snapshot = next_snapshot(latest, new.kind, new.amount, new.is_transfer);
    if !snapshot.is_finite() {
        return Err(overflow(new.amount));
    }

    let recorded = transaction::ActiveModel {
        kind: Set(new.kind),
        amount: Set(new.amount),
        balance_snapshot: Set(snapshot),
        description: Set(new.description.clone()),
        timestamp: Set(new.timestamp),
        bucket_id: Set(bucket.map(|b| b.id)),
        is_transfer: Set(new.is_transfer),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    if let Some(bucket) = bucket {
        apply_bucket_delta(conn, bucket, new.kind, new.amount).await?;
    }

    Ok(recorded)
}

/// Rule 5: returns a hidden bucket's balance to the free pool.
///
/// `prior` is the bucket as it was before it was hidden. Records a single transfer
/// expense for the full balance, which leaves total wealth unchanged and the bucket at
/// zero. Returns `None` when there is nothing to sweep.
pub async fn sweep<C>(conn: &C, prior: &bucket::Model) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    if prior.balance <= 0.0 {
        return Ok(None);
    }

    let compensation = NewTransaction::expense(prior.balance)
        .in_bucket(prior.id)
        .as_transfer()
        .with_description(SWEEP_DESCRIPTION);
    let recorded = record(conn, &compensation, Some(prior)).await?;
    info!(
        bucket_id = prior.id,
        amount = prior.balance,
        transaction_id = recorded.id,
        "Swept hidden bucket balance back to free balance"
    );
    Ok(Some(recorded))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::{balance, bucket as buckets, transaction::insert_transaction},
        entities::Transaction,
        test_utils::*,
    };
    use sea_orm::{DatabaseConnection, QueryOrder};
    use std::collections::HashMap;

    #[test]
    fn test_next_snapshot() {
        assert_eq!(next_snapshot(100.0, TransactionKind::Income, 20.0, false), 120.0);
        assert_eq!(next_snapshot(100.0, TransactionKind::Expense, 20.0, false), 80.0);
        assert_eq!(next_snapshot(100.0, TransactionKind::Income, 20.0, true), 100.0);
        assert_eq!(next_snapshot(100.0, TransactionKind::Expense, 20.0, true), 100.0);
        assert_eq!(next_snapshot(0.3, TransactionKind::Expense, 0.1, false), 0.2);
    }

    #[tokio::test]
    async fn test_bucket_expense_rule() -> Result<()> {
        let (db, vacation) = setup_with_bucket().await?;
        insert_transaction(&db, income(100.0)).await?;
        insert_transaction(&db, income(30.0).in_bucket(vacation.id).as_transfer()).await?;

        let err = insert_transaction(&db, expense(30.01).in_bucket(vacation.id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFunds {
                rule: Rule::BucketExpense,
                available: 30.0,
                required: 30.01
            }
        ));

        // Exactly draining the bucket is allowed
        insert_transaction(&db, expense(30.0).in_bucket(vacation.id)).await?;
        assert_eq!(buckets::get_bucket(&db, vacation.id).await?.balance, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_free_balance_rule_ignores_allocated_money() -> Result<()> {
        let (db, vacation) = setup_with_bucket().await?;
        insert_transaction(&db, income(100.0)).await?;
        insert_transaction(&db, income(70.0).in_bucket(vacation.id).as_transfer()).await?;

        let err = insert_transaction(&db, expense(31.0)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFunds {
                rule: Rule::FreeBalanceExpense,
                ..
            }
        ));
        insert_transaction(&db, expense(30.0)).await?;
        assert_eq!(balance::current_free_balance(&db).await?, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_into_bucket_rule() -> Result<()> {
        let (db, vacation) = setup_with_bucket().await?;
        insert_transaction(&db, income(10.0)).await?;

        let err = insert_transaction(&db, income(10.5).in_bucket(vacation.id).as_transfer())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFunds {
                rule: Rule::TransferIntoBucket,
                ..
            }
        ));

        // A plain income into a bucket is new money and needs no free balance
        insert_transaction(&db, income(10.5).in_bucket(vacation.id)).await?;
        assert_eq!(buckets::get_bucket(&db, vacation.id).await?.balance, 10.5);
        assert_eq!(balance::current_free_balance(&db).await?, 10.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_out_of_bucket_frees_money() -> Result<()> {
        let (db, vacation) = setup_with_bucket().await?;
        insert_transaction(&db, income(50.0)).await?;
        insert_transaction(&db, income(50.0).in_bucket(vacation.id).as_transfer()).await?;
        assert_eq!(balance::current_free_balance(&db).await?, 0.0);

        let back = insert_transaction(&db, expense(20.0).in_bucket(vacation.id).as_transfer())
            .await?;
        assert_eq!(back.balance_snapshot, 50.0);
        assert_eq!(balance::current_free_balance(&db).await?, 20.0);
        assert_eq!(buckets::get_bucket(&db, vacation.id).await?.balance, 30.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_write_leaves_no_trace() -> Result<()> {
        let (db, vacation) = setup_with_bucket().await?;
        insert_transaction(&db, income(5.0)).await?;
        let before = Transaction::find().all(&db).await?;

        assert!(
            insert_transaction(&db, expense(6.0).in_bucket(vacation.id))
                .await
                .is_err()
        );
        assert!(insert_transaction(&db, expense(6.0)).await.is_err());

        assert_eq!(Transaction::find().all(&db).await?, before);
        assert_eq!(buckets::get_bucket(&db, vacation.id).await?.balance, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_amounts_never_reach_the_store() -> Result<()> {
        let (db, vacation) = setup_with_bucket().await?;

        let err = insert_transaction(&db, income(1e307)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAmount { .. }));

        // Each amount is valid alone but their sum is not finite
        insert_transaction(&db, income(1.5e306)).await?;
        let err = insert_transaction(&db, income(1.5e306).in_bucket(vacation.id))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount { .. }));

        assert_eq!(Transaction::find().all(&db).await?.len(), 1);
        assert_eq!(buckets::get_bucket(&db, vacation.id).await?.balance, 0.0);
        assert!(balance::current_free_balance(&db).await?.is_finite());
        Ok(())
    }

    #[test]
    fn test_next_snapshot_overflow_is_not_finite() {
        let big = f64::MAX / 150.0;
        let snapshot = next_snapshot(big, TransactionKind::Income, big, false);
        assert!(!snapshot.is_finite());
    }

    #[tokio::test]
    async fn test_sweep_skips_empty_bucket() -> Result<()> {
        let (db, vacation) = setup_with_bucket().await?;
        assert!(sweep(&db, &vacation).await?.is_none());
        assert!(Transaction::find().all(&db).await?.is_empty());
        Ok(())
    }

    /// Small deterministic generator so the interleaving test needs no extra crate.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn below(&mut self, n: u64) -> u64 {
            self.next() % n
        }
    }

    async fn signed_history_sum(db: &DatabaseConnection, bucket_id: i64) -> Result<f64> {
        let history = Transaction::find()
            .filter(transaction::Column::BucketId.eq(bucket_id))
            .all(db)
            .await?;
        Ok(round_to_cents(
            history.iter().map(|t| t.kind.signed(t.amount)).sum(),
        ))
    }

    #[tokio::test]
    async fn test_free_balance_formula_holds_under_interleavings() -> Result<()> {
        for seed in [0x9E37_79B9_u64, 42, 7_777_777, 123_456_789] {
            let db = setup_test_db().await?;
            let mut rng = XorShift(seed);
            let a = create_test_bucket(&db, "A").await?;
            let b = create_test_bucket(&db, "B").await?;
            let ids = [a.id, b.id];

            // Reference model maintained independently of the engine
            let mut free = 0.0_f64;
            let mut held: HashMap<i64, f64> = ids.iter().map(|&id| (id, 0.0)).collect();
            let mut snapshots: Vec<(i64, f64)> = Vec::new();

            for _ in 0..60 {
                let amount = (rng.below(5_000) + 1) as f64 / 100.0;
                let target = ids[rng.below(2) as usize];
                let new = match rng.below(6) {
                    0 => income(amount),
                    1 => expense(amount),
                    2 => income(amount).in_bucket(target),
                    3 => expense(amount).in_bucket(target),
                    4 => income(amount).in_bucket(target).as_transfer(),
                    _ => expense(amount).in_bucket(target).as_transfer(),
                };

                let expected_ok = match (new.kind, new.bucket_id, new.is_transfer) {
                    (TransactionKind::Expense, None, _) => round_to_cents(free - amount) >= 0.0,
                    (TransactionKind::Expense, Some(id), _) => {
                        round_to_cents(held[&id] - amount) >= 0.0
                    }
                    (TransactionKind::Income, Some(_), true) => {
                        round_to_cents(free - amount) >= 0.0
                    }
                    (TransactionKind::Income, _, _) => true,
                };

                let result = insert_transaction(&db, new.clone()).await;
                assert_eq!(result.is_ok(), expected_ok, "seed {seed}: {new:?}");
                let Ok(recorded) = result else { continue };
                snapshots.push((recorded.id, recorded.balance_snapshot));

                match (new.kind, new.bucket_id, new.is_transfer) {
                    (kind, None, _) => free = round_to_cents(free + kind.signed(amount)),
                    (kind, Some(id), transfer) => {
                        let slot = held.get_mut(&id).unwrap();
                        *slot = round_to_cents(*slot + kind.signed(amount));
                        if transfer {
                            free = round_to_cents(free - kind.signed(amount));
                        }
                    }
                }

                assert_eq!(balance::current_free_balance(&db).await?, free, "seed {seed}");
                for &id in &ids {
                    let cached = buckets::get_bucket(&db, id).await?.balance;
                    assert!(cached >= 0.0);
                    assert_eq!(cached, held[&id]);
                    assert_eq!(signed_history_sum(&db, id).await?, cached);
                }
            }

            // Snapshots written earlier never moved
            let stored = Transaction::find()
                .order_by_asc(transaction::Column::Id)
                .all(&db)
                .await?;
            let stored: Vec<(i64, f64)> =
                stored.iter().map(|t| (t.id, t.balance_snapshot)).collect();
            assert_eq!(stored, snapshots);
        }
        Ok(())
    }
}
