//! Entity module - Contains all SeaORM entity definitions for the database.
//! A batch header owns its transfer legs and its history entries by `batch_id`.

pub mod batch_transfer;
pub mod batch_transfer_history;
pub mod batch_transfer_relation;
pub mod enums;

// Re-export specific types to avoid conflicts
pub use batch_transfer::{
    Column as BatchTransferColumn, Entity as BatchTransfer, Model as BatchTransferModel,
};
pub use batch_transfer_history::{
    Column as BatchTransferHistoryColumn, Entity as BatchTransferHistory,
    Model as BatchTransferHistoryModel,
};
pub use batch_transfer_relation::{
    Column as BatchTransferRelationColumn, Entity as BatchTransferRelation,
    Model as BatchTransferRelationModel,
};
pub use enums::{BatchMode, ContactType, TransferStatus};
