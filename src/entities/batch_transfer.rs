//! Batch transfer entity - One row per bulk-transfer request.
//!
//! A batch fixes either its source (`one_to_many`) or its target (`many_to_one`)
//! and owns its relations and history entries through `batch_id`.

use super::enums::{BatchMode, TransferStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Batch transfer header model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batch_transfers")]
pub struct Model {
    /// Unique identifier for the batch
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name shown in the admin UI
    pub name: String,
    /// Human-readable batch number, `BT<unix millis>`
    pub batch_number: String,
    /// Whether the source or the target is fixed
    pub batch_type: BatchMode,
    /// Aggregate lifecycle status
    pub status: TransferStatus,
    /// Number of relations created with the batch
    pub total_accounts: i32,
    /// Sum of relation amounts at creation, as a decimal string
    pub total_amount: String,
    /// Relations that completed successfully
    pub success_count: i32,
    /// Relations that failed
    pub fail_count: i32,
    /// Free-text note, also sent to the gateway as the transfer memo
    pub note: Option<String>,
    /// Set when the batch reaches `completed` or `failed`
    pub end_time: Option<DateTimeUtc>,
    /// Operator that created the batch
    pub created_by: Option<String>,
    /// When the batch was created
    pub created_at: DateTimeUtc,
    /// When the batch was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `BatchTransfer` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One batch has many transfer legs
    #[sea_orm(has_many = "super::batch_transfer_relation::Entity")]
    Relations,
    /// One batch has many history entries
    #[sea_orm(has_many = "super::batch_transfer_history::Entity")]
    Histories,
}

impl Related<super::batch_transfer_relation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Relations.def()
    }
}

impl Related<super::batch_transfer_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Histories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
