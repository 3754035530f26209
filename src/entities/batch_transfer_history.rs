//! Batch transfer history entity - Append-only audit trail of a batch.

use super::enums::TransferStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Batch transfer history model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batch_transfer_histories")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning batch
    pub batch_id: i64,
    /// Batch status at the time of the entry
    pub status: TransferStatus,
    /// Human-readable summary
    pub message: String,
    /// Optional structured payload
    pub details: Option<Json>,
    /// When the entry was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `BatchTransferHistory` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one batch
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
