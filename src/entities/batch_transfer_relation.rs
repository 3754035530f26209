//! Batch transfer relation entity - One transfer leg inside a batch.
//!
//! The recipient is resolved from `target_identifier` + `contact_type`, or, for
//! `many_to_one` batches without an identifier, from `target_account_id` as an
//! internal transfer.

use super::enums::{ContactType, TransferStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Batch transfer relation model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batch_transfer_relations")]
pub struct Model {
    /// Unique identifier for the relation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning batch
    pub batch_id: i64,
    /// Paying internal account
    pub source_account_id: Option<i64>,
    /// Receiving internal account, if the recipient is one of ours
    pub target_account_id: Option<i64>,
    /// How `target_identifier` addresses the recipient
    pub contact_type: ContactType,
    /// Recipient uid, email or internal reference
    pub target_identifier: Option<String>,
    /// Amount as a decimal string
    pub amount: String,
    /// Lifecycle status of this leg
    pub status: TransferStatus,
    /// Provider transfer id, set on success
    pub transfer_id: Option<i64>,
    /// Last error reported for this leg, set on failure
    pub error_message: Option<String>,
    /// When the relation was created
    pub created_at: DateTimeUtc,
    /// When the relation was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `BatchTransferRelation` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each relation belongs to one batch
    #[sea_orm(
        belongs_to = "super::batch_transfer::Entity",
        from = "Column::BatchId",
        to = "super::batch_transfer::Column::Id"
    )]
    BatchTransfer,
}

impl Related<super::batch_transfer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchTransfer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
