//! Batch status rules and batch-level bookkeeping.
//!
//! Two rules decide a batch's status and they are kept separate on purpose:
//! [`execute_terminal_status`] is applied by a full execution from the counts of
//! that run, while [`derive_batch_status`] looks at every stored relation and is
//! used after a resume or a single-relation retry. They disagree in edge cases
//! (a run that only touched some relations, or relations left in `processing`).

use crate::{
    entities::{BatchTransferRelation, TransferStatus, batch_transfer, batch_transfer_relation},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};
use tracing::debug;

/// Status after a full execution: `failed` only when nothing succeeded.
#[must_use]
pub const fn execute_terminal_status(success_count: i32, failed_count: i32) -> TransferStatus {
    if failed_count == 0 || success_count > 0 {
        TransferStatus::Completed
    } else {
        TransferStatus::Failed
    }
}

/// Relation counts of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationCounts {
    /// All relations
    pub total: u64,
    /// Relations still `pending` or `processing`
    pub in_flight: u64,
    /// Relations that ended `failed`
    pub failed: u64,
}

impl RelationCounts {
    /// `processing` while anything is in flight, `failed` when every relation
    /// failed, `completed` otherwise.
    #[must_use]
    pub const fn derived_status(&self) -> TransferStatus {
        if self.in_flight > 0 {
            TransferStatus::Processing
        } else if self.failed == self.total {
            TransferStatus::Failed
        } else {
            TransferStatus::Completed
        }
    }
}

/// Counts the relations of a batch by status group.
pub async fn count_relations<C>(db: &C, batch_id: i64) -> Result<RelationCounts>
where
    C: ConnectionTrait,
{
    let of_batch = || {
        BatchTransferRelation::find()
            .filter(batch_transfer_relation::Column::BatchId.eq(batch_id))
    };

    let total = of_batch().count(db).await?;
    let in_flight = of_batch()
        .filter(
            batch_transfer_relation::Column::Status
                .is_in([TransferStatus::Pending, TransferStatus::Processing]),
        )
        .count(db)
        .await?;
    let failed = of_batch()
        .filter(batch_transfer_relation::Column::Status.eq(TransferStatus::Failed))
        .count(db)
        .await?;

    Ok(RelationCounts {
        total,
        in_flight,
        failed,
    })
}

/// Derives a batch's status from its stored relations.
pub async fn derive_batch_status<C>(db: &C, batch_id: i64) -> Result<TransferStatus>
where
    C: ConnectionTrait,
{
    let counts = count_relations(db, batch_id).await?;
    let status = counts.derived_status();
    debug!(batch_id, ?counts, status = status.as_str(), "Derived batch status");
    Ok(status)
}

/// Whether every relation of the batch ended `completed`.
pub async fn all_relations_completed<C>(db: &C, batch_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let unfinished = BatchTransferRelation::find()
        .filter(batch_transfer_relation::Column::BatchId.eq(batch_id))
        .filter(batch_transfer_relation::Column::Status.ne(TransferStatus::Completed))
        .count(db)
        .await?;
    Ok(unfinished == 0)
}

/// Sets a batch's status. `end_time` is stamped for terminal statuses and cleared
/// otherwise, so a reopened batch carries no stale end time.
pub async fn update_batch_status<C>(db: &C, batch_id: i64, status: TransferStatus) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    let active = batch_transfer::ActiveModel {
        status: Set(status),
        end_time: Set(status.is_terminal().then_some(now)),
        updated_at: Set(now),
        ..Default::default()
    };

    batch_transfer::Entity::update_many()
        .set(active)
        .filter(batch_transfer::Column::Id.eq(batch_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Stores a batch's status together with its success and failure counters.
///
/// `end_time` is stamped for terminal statuses and cleared otherwise.
pub async fn store_batch_outcome<C>(
    db: &C,
    batch_id: i64,
    status: TransferStatus,
    success_count: i32,
    fail_count: i32,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    let active = batch_transfer::ActiveModel {
        status: Set(status),
        success_count: Set(success_count),
        fail_count: Set(fail_count),
        end_time: Set(status.is_terminal().then_some(now)),
        updated_at: Set(now),
        ..Default::default()
    };

    batch_transfer::Entity::update_many()
        .set(active)
        .filter(batch_transfer::Column::Id.eq(batch_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Adds one run's counts to a batch's stored counters and sets its status.
///
/// The counters are incremented in the update statement itself, so concurrent
/// writers never overwrite each other's counts. Returns the batch as stored
/// afterwards.
pub async fn accumulate_batch_outcome<C>(
    db: &C,
    batch_id: i64,
    status: TransferStatus,
    run_succeeded: i32,
    run_failed: i32,
) -> Result<batch_transfer::Model>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    batch_transfer::Entity::update_many()
        .col_expr(
            batch_transfer::Column::SuccessCount,
            Expr::col(batch_transfer::Column::SuccessCount).add(run_succeeded),
        )
        .col_expr(
            batch_transfer::Column::FailCount,
            Expr::col(batch_transfer::Column::FailCount).add(run_failed),
        )
        .col_expr(batch_transfer::Column::Status, Expr::value(status))
        .col_expr(
            batch_transfer::Column::EndTime,
            Expr::value(status.is_terminal().then_some(now)),
        )
        .col_expr(batch_transfer::Column::UpdatedAt, Expr::value(now))
        .filter(batch_transfer::Column::Id.eq(batch_id))
        .exec(db)
        .await?;

    batch_transfer::Entity::find_by_id(batch_id)
        .one(db)
        .await?
        .ok_or(Error::BatchNotFound { id: batch_id })
}
