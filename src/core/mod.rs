//! Core business logic - framework-agnostic batch transfer operations.

/// Batch creation, validation and lookups
pub mod batch;
/// Append-only batch history
pub mod history;
/// Per-batch mutual exclusion
pub mod locks;
/// Execute, resume and single-relation processing
pub mod orchestrator;
/// Relation lookups and status changes
pub mod relation;
/// `{success, message, data}` response envelope
pub mod response;
/// Batch status rules and batch-level bookkeeping
pub mod status;

pub use orchestrator::{BatchRunSummary, BatchTransferService, RelationOutcome};
pub use response::ApiResponse;
