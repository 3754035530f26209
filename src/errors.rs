//! Unified error type for the batch transfer service.
//!
//! Every fallible operation in the crate returns [`Result<T>`]. Database, HTTP and
//! serialization errors convert automatically so `?` works across layers.

use crate::entities::TransferStatus;
use serde_json::json;
use thiserror::Error;

/// All errors produced by the batch transfer service.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// Underlying SeaORM / SQL error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// No batch exists with the given id
    #[error("Batch transfer not found: {id}")]
    BatchNotFound {
        /// Requested batch id
        id: i64,
    },

    /// No relation exists with the given id
    #[error("Batch transfer relation not found: {id}")]
    RelationNotFound {
        /// Requested relation id
        id: i64,
    },

    /// The same target (`one_to_many`) or source (`many_to_one`) appears more than once
    #[error("Duplicate {field} values in batch request: {}", duplicates.join(", "))]
    DuplicateRelations {
        /// Which relation field collided (`target_identifier` or `source_account_id`)
        field: &'static str,
        /// Each duplicated value, reported once in first-seen order
        duplicates: Vec<String>,
    },

    /// Relations that lack the field their batch mode addresses them by
    #[error("Relations without {field} in batch request at positions: {}", positions_list(indexes))]
    IncompleteRelations {
        /// The required field (`target_identifier` or `source_account_id`)
        field: &'static str,
        /// Zero-based positions of the offending relations in the request
        indexes: Vec<usize>,
    },

    /// A batch must contain at least one relation
    #[error("Batch transfer must contain at least one relation")]
    EmptyBatch,

    /// Re-running a relation that already transferred successfully
    #[error("Relation {id} has already completed")]
    RelationAlreadyCompleted {
        /// Relation id
        id: i64,
    },

    /// A relation status change that would move its lifecycle backwards
    #[error("Relation {id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        /// Relation id
        id: i64,
        /// Current status
        from: TransferStatus,
        /// Requested status
        to: TransferStatus,
    },

    /// A relation has no paying account to transfer from
    #[error("Relation {id} has no source account")]
    MissingSourceAccount {
        /// Relation id
        id: i64,
    },

    /// The transfer gateway refused or could not perform a transfer
    #[error("Gateway error: {message}")]
    Gateway {
        /// Message reported by the gateway
        message: String,
    },

    /// HTTP transport error talking to the gateway
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Structured payload attached to failure responses, if the error carries one.
    #[must_use]
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::DuplicateRelations { duplicates, .. } => {
                Some(json!({ "duplicates": duplicates }))
            }
            Self::IncompleteRelations { field, indexes } => {
                Some(json!({ "field": field, "missing": indexes }))
            }
            Self::BatchNotFound { id } => Some(json!({ "batchId": id })),
            Self::RelationNotFound { id } | Self::RelationAlreadyCompleted { id } => {
                Some(json!({ "relationId": id }))
            }
            _ => None,
        }
    }
}

fn positions_list(indexes: &[usize]) -> String {
    indexes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
