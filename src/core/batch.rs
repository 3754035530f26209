//! Batch creation and batch/relation lookups.
//!
//! A batch is created in a single database transaction together with all of its
//! relations and the first history entry. Requests are validated for duplicate
//! recipients (`one_to_many`) or duplicate payers (`many_to_one`) before anything
//! is written.

use crate::{
    core::history,
    entities::{
        BatchMode, BatchTransfer, BatchTransferRelation, ContactType, TransferStatus,
        batch_transfer, batch_transfer_relation,
    },
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// One requested transfer leg.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationInput {
    /// Paying account; required in `many_to_one` mode
    #[serde(default)]
    pub source_account_id: Option<i64>,
    /// Receiving internal account
    #[serde(default)]
    pub target_account_id: Option<i64>,
    /// Recipient addressing, `inner` when absent
    #[serde(default)]
    pub contact_type: Option<ContactType>,
    /// Recipient uid, email or internal reference
    #[serde(default)]
    pub target_identifier: Option<String>,
    /// Decimal amount as entered by the operator
    pub amount: String,
}

/// Everything needed to create a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    /// Display name
    pub name: String,
    /// Which side is fixed
    pub mode: BatchMode,
    /// The fixed source (`one_to_many`) or fixed target (`many_to_one`) account
    #[serde(default)]
    pub fixed_account_id: Option<i64>,
    /// Transfer legs
    pub relations: Vec<RelationInput>,
    /// Free-text note; the name is used when absent
    #[serde(default)]
    pub note: Option<String>,
    /// Operator creating the batch
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Summary returned after a batch is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBatch {
    /// New batch id
    pub batch_id: i64,
    /// Human-readable batch number
    pub batch_number: String,
    /// Sum of parseable relation amounts
    pub total_amount: String,
    /// Number of relations inserted
    pub relations_count: usize,
}

/// Returns each value that occurs more than once, once, in the order its second
/// occurrence is seen. Missing and empty values are not compared; see
/// [`missing_positions`].
pub fn find_duplicates<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut duplicates = Vec::new();

    for value in values.into_iter().flatten() {
        if value.is_empty() {
            continue;
        }
        let count = counts.entry(value.clone()).or_insert(0);
        *count += 1;
        if *count == 2 {
            duplicates.push(value);
        }
    }

    duplicates
}

/// Zero-based positions of the values that are missing or blank.
pub fn missing_positions<I>(values: I) -> Vec<usize>
where
    I: IntoIterator<Item = Option<String>>,
{
    values
        .into_iter()
        .enumerate()
        .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
        .map(|(index, _)| index)
        .collect()
}

/// Checks the per-mode addressing and uniqueness rules for a request.
///
/// `one_to_many` relations must name their recipient and `many_to_one` relations
/// must name their payer; a relation lacking that field fails validation before
/// duplicates are looked for.
pub fn validate_request(request: &CreateBatchRequest) -> Result<()> {
    if request.relations.is_empty() {
        return Err(Error::EmptyBatch);
    }

    let (field, values): (&'static str, Vec<Option<String>>) = match request.mode {
        BatchMode::OneToMany => (
            "target_identifier",
            request
                .relations
                .iter()
                .map(|r| r.target_identifier.clone())
                .collect(),
        ),
        BatchMode::ManyToOne => (
            "source_account_id",
            request
                .relations
                .iter()
                .map(|r| r.source_account_id.map(|id| id.to_string()))
                .collect(),
        ),
    };

    let indexes = missing_positions(values.iter().cloned());
    if !indexes.is_empty() {
        return Err(Error::IncompleteRelations { field, indexes });
    }

    // many_to_one recipients fall back to the fixed target account
    if request.mode == BatchMode::ManyToOne && request.fixed_account_id.is_none() {
        let indexes = missing_positions(request.relations.iter().map(|r| {
            r.target_identifier
                .clone()
                .or_else(|| r.target_account_id.map(|id| id.to_string()))
        }));
        if !indexes.is_empty() {
            return Err(Error::IncompleteRelations {
                field: "target_identifier",
                indexes,
            });
        }
    }

    let duplicates = find_duplicates(values);
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(Error::DuplicateRelations { field, duplicates })
    }
}

/// Parses a decimal amount, treating anything unparseable as zero.
#[must_use]
pub fn parse_amount_or_zero(amount: &str) -> Decimal {
    amount.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO)
}

/// Sums relation amounts; unparseable amounts contribute zero.
#[must_use]
pub fn total_amount(relations: &[RelationInput]) -> String {
    relations
        .iter()
        .map(|r| parse_amount_or_zero(&r.amount))
        .fold(Decimal::ZERO, Decimal::saturating_add)
        .normalize()
        .to_string()
}

/// Creates a batch with all of its relations and the initial history entry.
///
/// Nothing is written when validation fails, and every insert is rolled back if
/// any of them fails.
///
/// # Errors
/// - [`Error::EmptyBatch`] when no relations are given
/// - [`Error::IncompleteRelations`] when a relation lacks its recipient or payer
/// - [`Error::DuplicateRelations`] when the per-mode uniqueness rule is violated
/// - [`Error::Database`] when an insert fails
#[instrument(skip(db, request), fields(name = %request.name, mode = request.mode.as_str()))]
pub async fn create_batch(
    db: &DatabaseConnection,
    request: CreateBatchRequest,
) -> Result<CreatedBatch> {
    validate_request(&request)?;

    let total_amount = total_amount(&request.relations);
    let relations_count = request.relations.len();
    let total_accounts = i32::try_from(relations_count).map_err(|_| Error::Config {
        message: format!("Too many relations in one batch: {relations_count}"),
    })?;

    let now = chrono::Utc::now();
    let batch_number = format!("BT{}", now.timestamp_millis());

    let txn = db.begin().await?;

    let batch = batch_transfer::ActiveModel {
        name: Set(request.name.clone()),
        batch_number: Set(batch_number.clone()),
        batch_type: Set(request.mode),
        status: Set(TransferStatus::Pending),
        total_accounts: Set(total_accounts),
        total_amount: Set(total_amount.clone()),
        success_count: Set(0),
        fail_count: Set(0),
        note: Set(request.note.clone().or_else(|| Some(request.name.clone()))),
        end_time: Set(None),
        created_by: Set(request.created_by.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let rows = request.relations.iter().map(|relation| {
        let (source_account_id, target_account_id) = match request.mode {
            BatchMode::OneToMany => (
                request.fixed_account_id.or(relation.source_account_id),
                relation.target_account_id,
            ),
            BatchMode::ManyToOne => (
                relation.source_account_id,
                request.fixed_account_id.or(relation.target_account_id),
            ),
        };

        batch_transfer_relation::ActiveModel {
            batch_id: Set(batch.id),
            source_account_id: Set(source_account_id),
            target_account_id: Set(target_account_id),
            contact_type: Set(relation.contact_type.unwrap_or_default()),
            target_identifier: Set(relation.target_identifier.clone()),
            amount: Set(relation.amount.clone()),
            status: Set(TransferStatus::Pending),
            transfer_id: Set(None),
            error_message: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
    });
    BatchTransferRelation::insert_many(rows).exec(&txn).await?;

    history::append_history(
        &txn,
        batch.id,
        TransferStatus::Pending,
        "Batch transfer created".to_string(),
        Some(json!({
            "type": request.mode.as_str(),
            "totalAmount": total_amount,
            "relationsCount": relations_count,
        })),
    )
    .await?;

    txn.commit().await?;

    info!(
        batch_id = batch.id,
        %batch_number,
        %total_amount,
        relations_count,
        "Batch transfer created"
    );

    Ok(CreatedBatch {
        batch_id: batch.id,
        batch_number,
        total_amount,
        relations_count,
    })
}

/// Retrieves a batch by id, returning None if it does not exist.
pub async fn get_batch<C>(db: &C, batch_id: i64) -> Result<Option<batch_transfer::Model>>
where
    C: ConnectionTrait,
{
    BatchTransfer::find_by_id(batch_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a batch by id, failing with [`Error::BatchNotFound`] if it does not exist.
pub async fn require_batch<C>(db: &C, batch_id: i64) -> Result<batch_transfer::Model>
where
    C: ConnectionTrait,
{
    get_batch(db, batch_id)
        .await?
        .ok_or(Error::BatchNotFound { id: batch_id })
}

/// Lists batches newest first, optionally only those in `status`.
pub async fn list_batches(
    db: &DatabaseConnection,
    status: Option<TransferStatus>,
) -> Result<Vec<batch_transfer::Model>> {
    let mut query = BatchTransfer::find();
    if let Some(status) = status {
        query = query.filter(batch_transfer::Column::Status.eq(status));
    }
    query
        .order_by_desc(batch_transfer::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// All relations of a batch in insertion order.
pub async fn get_relations<C>(db: &C, batch_id: i64) -> Result<Vec<batch_transfer_relation::Model>>
where
    C: ConnectionTrait,
{
    debug!(batch_id, "Loading batch relations");
    BatchTransferRelation::find()
        .filter(batch_transfer_relation::Column::BatchId.eq(batch_id))
        .order_by_asc(batch_transfer_relation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
