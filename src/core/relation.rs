//! Relation lookups and status bookkeeping.
//!
//! Every status write goes through [`set_relation_status`], which refuses to move a
//! relation's lifecycle backwards.

use crate::{
    entities::{BatchTransferRelation, TransferStatus, batch_transfer_relation},
    errors::{Error, Result},
};
use sea_orm::{IntoActiveModel, QueryOrder, Set, prelude::*};
use tracing::debug;

/// Retrieves a relation by id, returning None if it does not exist.
pub async fn get_relation<C>(db: &C, relation_id: i64) -> Result<Option<batch_transfer_relation::Model>>
where
    C: ConnectionTrait,
{
    BatchTransferRelation::find_by_id(relation_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a relation by id, failing with [`Error::RelationNotFound`] if it does not exist.
pub async fn require_relation<C>(db: &C, relation_id: i64) -> Result<batch_transfer_relation::Model>
where
    C: ConnectionTrait,
{
    get_relation(db, relation_id)
        .await?
        .ok_or(Error::RelationNotFound { id: relation_id })
}

/// Relations of a batch still waiting for their first attempt, in insertion order.
pub async fn pending_relations<C>(
    db: &C,
    batch_id: i64,
) -> Result<Vec<batch_transfer_relation::Model>>
where
    C: ConnectionTrait,
{
    BatchTransferRelation::find()
        .filter(batch_transfer_relation::Column::BatchId.eq(batch_id))
        .filter(batch_transfer_relation::Column::Status.eq(TransferStatus::Pending))
        .order_by_asc(batch_transfer_relation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// What to record alongside a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusNote {
    /// Plain status change
    None,
    /// Successful transfer, with the provider id when one was returned
    TransferId(Option<i64>),
    /// Failure reason
    Error(String),
}

/// Moves a relation to `next`, stamping `updated_at`.
///
/// A completed relation clears any earlier error; a failed one keeps its transfer id
/// untouched and records the failure reason.
///
/// # Errors
/// [`Error::InvalidStatusTransition`] if `next` would move the lifecycle backwards.
pub async fn set_relation_status<C>(
    db: &C,
    relation: batch_transfer_relation::Model,
    next: TransferStatus,
    note: StatusNote,
) -> Result<batch_transfer_relation::Model>
where
    C: ConnectionTrait,
{
    if !relation.status.can_transition_to(next) {
        return Err(Error::InvalidStatusTransition {
            id: relation.id,
            from: relation.status,
            to: next,
        });
    }

    debug!(
        relation_id = relation.id,
        from = relation.status.as_str(),
        to = next.as_str(),
        "Updating relation status"
    );

    let mut active = relation.into_active_model();
    active.status = Set(next);
    active.updated_at = Set(chrono::Utc::now());
    match note {
        StatusNote::None => {}
        StatusNote::TransferId(transfer_id) => {
            if transfer_id.is_some() {
                active.transfer_id = Set(transfer_id);
            }
            active.error_message = Set(None);
        }
        StatusNote::Error(message) => {
            active.error_message = Set(Some(message));
        }
    }

    active.update(db).await.map_err(Into::into)
}
