//! Batch history - the append-only audit trail of a batch.
//!
//! Entries are only ever inserted; nothing in the crate updates or deletes them.

use crate::{
    entities::{BatchTransferHistory, TransferStatus, batch_transfer_history},
    errors::Result,
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Appends a history entry for `batch_id`.
///
/// Generic over the connection so it can run inside the batch-creation transaction.
pub async fn append_history<C>(
    db: &C,
    batch_id: i64,
    status: TransferStatus,
    message: String,
    details: Option<Json>,
) -> Result<batch_transfer_history::Model>
where
    C: ConnectionTrait,
{
    batch_transfer_history::ActiveModel {
        batch_id: Set(batch_id),
        status: Set(status),
        message: Set(message),
        details: Set(details),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// All history entries of a batch, oldest first.
pub async fn get_history<C>(db: &C, batch_id: i64) -> Result<Vec<batch_transfer_history::Model>>
where
    C: ConnectionTrait,
{
    BatchTransferHistory::find()
        .filter(batch_transfer_history::Column::BatchId.eq(batch_id))
        .order_by_asc(batch_transfer_history::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
