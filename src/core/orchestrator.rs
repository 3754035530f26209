//! Batch transfer orchestration - execute, resume and single-relation retries.
//!
//! Relations are processed one at a time in insertion order. A relation that fails,
//! whether the gateway refused it or something errored along the way, is recorded as
//! failed and the loop moves on. Batch-level calls on the same batch are serialized
//! through [`BatchLocks`].

use crate::{
    core::{
        batch::{self, CreateBatchRequest, CreatedBatch},
        history,
        locks::BatchLocks,
        relation::{self, StatusNote},
        status,
    },
    entities::{BatchMode, ContactType, TransferStatus, batch_transfer, batch_transfer_relation},
    errors::{Error, Result},
    gateway::{BATCH_TRANSFER_ORIGIN, TransferGateway, TransferRequest},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Fallback failure reason when the gateway refuses without a message.
const DEFAULT_FAILURE_MESSAGE: &str = "Transfer failed";

/// Outcome of an execute or resume call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRunSummary {
    /// Batch that was run
    pub batch_id: i64,
    /// Successful relations counted on the batch after this call
    pub success_count: i32,
    /// Failed relations counted on the batch after this call
    pub failed_count: i32,
    /// Batch status after this call
    pub status: TransferStatus,
    /// Relations attempted by this call
    pub processed: usize,
    /// Human-readable summary
    #[serde(skip)]
    pub message: String,
}

/// Outcome of a single-relation retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationOutcome {
    /// Relation that was processed
    pub relation_id: i64,
    /// Its batch
    pub batch_id: i64,
    /// Whether the transfer went through
    pub success: bool,
    /// Batch status derived after the retry
    pub batch_status: TransferStatus,
}

/// Success and failure counts of one pass over a set of relations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    succeeded: i32,
    failed: i32,
}

/// Result of asking the gateway for one transfer. Never an error: anything that goes
/// wrong becomes a failure reason.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TransferAttempt {
    Succeeded { transfer_id: Option<i64> },
    Failed { message: String },
}

/// Builds the gateway request for one relation of `batch`.
///
/// In `one_to_many` batches the relation carries the batch's fixed source. In
/// `many_to_one` batches a relation without a target identifier pays its target
/// account as an internal transfer.
///
/// # Errors
/// [`Error::MissingSourceAccount`] if the relation has no paying account.
pub fn resolve_transfer(
    batch: &batch_transfer::Model,
    relation: &batch_transfer_relation::Model,
    auto_2fa: bool,
) -> Result<TransferRequest> {
    let source_account_id = relation
        .source_account_id
        .ok_or(Error::MissingSourceAccount { id: relation.id })?;

    let mut contact_type = relation.contact_type;
    let mut target_identifier = relation.target_identifier.clone().unwrap_or_default();

    if batch.batch_type == BatchMode::ManyToOne && target_identifier.is_empty() {
        if let Some(target_account_id) = relation.target_account_id {
            contact_type = ContactType::Inner;
            target_identifier = target_account_id.to_string();
        }
    }

    Ok(TransferRequest {
        source_account_id: source_account_id.to_string(),
        contact_type,
        target_identifier,
        amount: relation.amount.clone(),
        origin: BATCH_TRANSFER_ORIGIN.to_string(),
        force: false,
        memo: batch.note.clone(),
        auto_2fa,
    })
}

/// Orchestrates batch transfers against one database and one gateway.
pub struct BatchTransferService {
    db: DatabaseConnection,
    gateway: Arc<dyn TransferGateway>,
    locks: BatchLocks,
}

impl BatchTransferService {
    /// Creates a service using `gateway` for every transfer it performs.
    #[must_use]
    pub fn new(db: DatabaseConnection, gateway: Arc<dyn TransferGateway>) -> Self {
        Self {
            db,
            gateway,
            locks: BatchLocks::new(),
        }
    }

    /// Database connection used by the service.
    #[must_use]
    pub const fn database(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Validates and stores a new batch. See [`batch::create_batch`].
    pub async fn create_batch(&self, request: CreateBatchRequest) -> Result<CreatedBatch> {
        batch::create_batch(&self.db, request).await
    }

    /// Runs every pending relation of a batch and stores this run's counts.
    ///
    /// The batch ends `failed` only if no relation succeeded in this run.
    ///
    /// # Errors
    /// [`Error::BatchNotFound`] for an unknown batch, or a database error from the
    /// batch-level bookkeeping. Relation failures never end the call early.
    #[instrument(skip(self))]
    pub async fn execute_batch(&self, batch_id: i64, auto_2fa: bool) -> Result<BatchRunSummary> {
        let _guard = self.locks.acquire(batch_id).await;
        let batch = batch::require_batch(&self.db, batch_id).await?;

        let pending = relation::pending_relations(&self.db, batch_id).await?;
        if pending.is_empty() {
            info!(batch_id, "No pending relations to execute");
            return Ok(BatchRunSummary {
                batch_id,
                success_count: batch.success_count,
                failed_count: batch.fail_count,
                status: batch.status,
                processed: 0,
                message: "No pending relations".to_string(),
            });
        }

        status::update_batch_status(&self.db, batch_id, TransferStatus::Processing).await?;
        info!(batch_id, relations = pending.len(), "Executing batch transfer");

        let processed = pending.len();
        let tally = self.process_relations(&batch, pending, auto_2fa).await;

        let final_status = status::execute_terminal_status(tally.succeeded, tally.failed);
        status::store_batch_outcome(
            &self.db,
            batch_id,
            final_status,
            tally.succeeded,
            tally.failed,
        )
        .await?;

        let message = format!(
            "Batch transfer finished, succeeded: {}, failed: {}",
            tally.succeeded, tally.failed
        );
        history::append_history(
            &self.db,
            batch_id,
            final_status,
            message.clone(),
            Some(json!({
                "successCount": tally.succeeded,
                "failedCount": tally.failed,
            })),
        )
        .await?;

        info!(
            batch_id,
            succeeded = tally.succeeded,
            failed = tally.failed,
            status = final_status.as_str(),
            "Batch transfer executed"
        );

        Ok(BatchRunSummary {
            batch_id,
            success_count: tally.succeeded,
            failed_count: tally.failed,
            status: final_status,
            processed,
            message,
        })
    }

    /// Picks a batch up again.
    ///
    /// With nothing pending the batch is closed as `completed` when every relation
    /// completed and `failed` otherwise. Otherwise the pending relations are run,
    /// their counts are added to the stored counters and the status is derived from
    /// all stored relations.
    ///
    /// # Errors
    /// [`Error::BatchNotFound`] for an unknown batch, or a database error from the
    /// batch-level bookkeeping.
    #[instrument(skip(self))]
    pub async fn resume_batch(&self, batch_id: i64, auto_2fa: bool) -> Result<BatchRunSummary> {
        let _guard = self.locks.acquire(batch_id).await;
        let batch = batch::require_batch(&self.db, batch_id).await?;

        let pending = relation::pending_relations(&self.db, batch_id).await?;
        if pending.is_empty() {
            let final_status = if status::all_relations_completed(&self.db, batch_id).await? {
                TransferStatus::Completed
            } else {
                TransferStatus::Failed
            };
            status::update_batch_status(&self.db, batch_id, final_status).await?;
            info!(
                batch_id,
                status = final_status.as_str(),
                "Nothing pending, batch closed"
            );

            let message = match final_status {
                TransferStatus::Completed => "All transfers completed",
                _ => "Batch transfer failed",
            };
            return Ok(BatchRunSummary {
                batch_id,
                success_count: batch.success_count,
                failed_count: batch.fail_count,
                status: final_status,
                processed: 0,
                message: message.to_string(),
            });
        }

        status::update_batch_status(&self.db, batch_id, TransferStatus::Processing).await?;
        info!(batch_id, relations = pending.len(), "Resuming batch transfer");

        let processed = pending.len();
        let tally = self.process_relations(&batch, pending, auto_2fa).await;

        let final_status = status::derive_batch_status(&self.db, batch_id).await?;
        let stored = status::accumulate_batch_outcome(
            &self.db,
            batch_id,
            final_status,
            tally.succeeded,
            tally.failed,
        )
        .await?;
        let total_succeeded = stored.success_count;
        let total_failed = stored.fail_count;

        let message = format!(
            "Batch transfer resumed, succeeded this run: {}, failed this run: {}, \
             total succeeded: {total_succeeded}, total failed: {total_failed}",
            tally.succeeded, tally.failed
        );
        history::append_history(
            &self.db,
            batch_id,
            final_status,
            message.clone(),
            Some(json!({
                "runSuccessCount": tally.succeeded,
                "runFailedCount": tally.failed,
                "successCount": total_succeeded,
                "failedCount": total_failed,
            })),
        )
        .await?;

        Ok(BatchRunSummary {
            batch_id,
            success_count: total_succeeded,
            failed_count: total_failed,
            status: final_status,
            processed,
            message,
        })
    }

    /// Re-runs the transfer of one relation and re-derives its batch's status.
    ///
    /// Pending and failed relations can be processed, and so can one left in
    /// `processing` by an interrupted run. A completed relation is refused so a
    /// finished transfer is never paid twice.
    ///
    /// # Errors
    /// [`Error::RelationNotFound`], [`Error::BatchNotFound`],
    /// [`Error::RelationAlreadyCompleted`], or a database error.
    #[instrument(skip(self))]
    pub async fn process_relation(
        &self,
        relation_id: i64,
        auto_2fa: bool,
    ) -> Result<RelationOutcome> {
        let batch_id = relation::require_relation(&self.db, relation_id)
            .await?
            .batch_id;
        let _guard = self.locks.acquire(batch_id).await;

        // Re-read under the lock; another call may have moved it meanwhile
        let relation = relation::require_relation(&self.db, relation_id).await?;
        if relation.status == TransferStatus::Completed {
            return Err(Error::RelationAlreadyCompleted { id: relation_id });
        }
        let batch = batch::require_batch(&self.db, batch_id).await?;

        let success = self.run_relation(&batch, relation, auto_2fa).await?;

        let batch_status = status::derive_batch_status(&self.db, batch_id).await?;
        status::update_batch_status(&self.db, batch_id, batch_status).await?;

        info!(
            relation_id,
            batch_id,
            success,
            batch_status = batch_status.as_str(),
            "Relation processed"
        );

        Ok(RelationOutcome {
            relation_id,
            batch_id,
            success,
            batch_status,
        })
    }

    /// Runs `relations` in order; an error on one relation is recorded on it and
    /// counted as a failure.
    async fn process_relations(
        &self,
        batch: &batch_transfer::Model,
        relations: Vec<batch_transfer_relation::Model>,
        auto_2fa: bool,
    ) -> Tally {
        let mut tally = Tally::default();

        for relation in relations {
            let relation_id = relation.id;
            match self.run_relation(batch, relation, auto_2fa).await {
                Ok(true) => tally.succeeded += 1,
                Ok(false) => tally.failed += 1,
                Err(e) => {
                    error!(relation_id, "Relation processing failed: {}", e);
                    self.record_relation_error(relation_id, e.to_string()).await;
                    tally.failed += 1;
                }
            }
        }

        tally
    }

    /// Marks a relation `processing`, calls the gateway and stores the outcome.
    /// Returns whether the transfer went through.
    async fn run_relation(
        &self,
        batch: &batch_transfer::Model,
        relation: batch_transfer_relation::Model,
        auto_2fa: bool,
    ) -> Result<bool> {
        let relation = if relation.status == TransferStatus::Processing {
            warn!(relation_id = relation.id, "Re-attempting relation left in processing");
            relation
        } else {
            relation::set_relation_status(
                &self.db,
                relation,
                TransferStatus::Processing,
                StatusNote::None,
            )
            .await?
        };

        match self.attempt_transfer(batch, &relation, auto_2fa).await {
            TransferAttempt::Succeeded { transfer_id } => {
                relation::set_relation_status(
                    &self.db,
                    relation,
                    TransferStatus::Completed,
                    StatusNote::TransferId(transfer_id),
                )
                .await?;
                Ok(true)
            }
            TransferAttempt::Failed { message } => {
                relation::set_relation_status(
                    &self.db,
                    relation,
                    TransferStatus::Failed,
                    StatusNote::Error(message),
                )
                .await?;
                Ok(false)
            }
        }
    }

    async fn attempt_transfer(
        &self,
        batch: &batch_transfer::Model,
        relation: &batch_transfer_relation::Model,
        auto_2fa: bool,
    ) -> TransferAttempt {
        let request = match resolve_transfer(batch, relation, auto_2fa) {
            Ok(request) => request,
            Err(e) => {
                warn!(relation_id = relation.id, "Cannot build transfer: {}", e);
                return TransferAttempt::Failed {
                    message: e.to_string(),
                };
            }
        };

        debug!(
            relation_id = relation.id,
            target = %request.target_identifier,
            amount = %request.amount,
            "Requesting transfer"
        );

        match self.gateway.transfer(&request).await {
            Ok(response) if response.success => TransferAttempt::Succeeded {
                transfer_id: response.transfer_id(),
            },
            Ok(response) => TransferAttempt::Failed {
                message: response
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            },
            Err(e) => {
                warn!(relation_id = relation.id, "Gateway call failed: {}", e);
                TransferAttempt::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Best effort: marks a relation failed after an error outside the gateway call.
    async fn record_relation_error(&self, relation_id: i64, message: String) {
        let stored = match relation::require_relation(&self.db, relation_id).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(relation_id, "Could not reload relation to record error: {}", e);
                return;
            }
        };

        if stored.status.can_transition_to(TransferStatus::Failed) {
            if let Err(e) = relation::set_relation_status(
                &self.db,
                stored,
                TransferStatus::Failed,
                StatusNote::Error(message),
            )
            .await
            {
                warn!(relation_id, "Could not record relation error: {}", e);
            }
        }
    }
}
