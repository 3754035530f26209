//! Shared test utilities for the batch transfer service.
//!
//! This module provides helpers for setting up test databases, building batch
//! requests with sensible defaults, and a scripted transfer gateway.

use crate::{
    core::batch::{self, CreateBatchRequest, CreatedBatch, RelationInput},
    entities::{BatchMode, ContactType, TransferStatus, batch_transfer, batch_transfer_relation},
    errors::{Error, Result},
    gateway::{TransferData, TransferGateway, TransferRequest, TransferResponse},
};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Fixed account used as the source of `one_to_many` and the target of
/// `many_to_one` test batches.
pub const TEST_FIXED_ACCOUNT: i64 = 500;

/// Message the scripted gateway refuses transfers with.
pub const REFUSAL_MESSAGE: &str = "Insufficient balance";

/// Routes tracing output to the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A relation paying `identifier` by email.
pub fn relation_to(identifier: &str, amount: &str) -> RelationInput {
    RelationInput {
        contact_type: Some(ContactType::Email),
        target_identifier: Some(identifier.to_string()),
        amount: amount.to_string(),
        ..Default::default()
    }
}

/// A relation paid from `source_account_id`, with no target identifier.
pub fn relation_from(source_account_id: i64, amount: &str) -> RelationInput {
    RelationInput {
        source_account_id: Some(source_account_id),
        amount: amount.to_string(),
        ..Default::default()
    }
}

/// A `one_to_many` request from [`TEST_FIXED_ACCOUNT`] named "Payroll".
pub fn one_to_many_request(relations: Vec<RelationInput>) -> CreateBatchRequest {
    CreateBatchRequest {
        name: "Payroll".to_string(),
        mode: BatchMode::OneToMany,
        fixed_account_id: Some(TEST_FIXED_ACCOUNT),
        relations,
        note: None,
        created_by: Some("tester".to_string()),
    }
}

/// A `many_to_one` request into [`TEST_FIXED_ACCOUNT`] named "Sweep".
pub fn many_to_one_request(relations: Vec<RelationInput>) -> CreateBatchRequest {
    CreateBatchRequest {
        name: "Sweep".to_string(),
        mode: BatchMode::ManyToOne,
        fixed_account_id: Some(TEST_FIXED_ACCOUNT),
        relations,
        note: None,
        created_by: None,
    }
}

/// Creates a `one_to_many` batch paying 10 to each email in `targets`.
pub async fn create_test_batch(db: &DatabaseConnection, targets: &[&str]) -> Result<CreatedBatch> {
    let relations = targets
        .iter()
        .map(|target| relation_to(target, "10"))
        .collect();
    batch::create_batch(db, one_to_many_request(relations)).await
}

/// Unsaved batch model for pure resolution tests.
pub fn batch_model(mode: BatchMode, note: Option<&str>) -> batch_transfer::Model {
    let now = chrono::Utc::now();
    batch_transfer::Model {
        id: 1,
        name: "Test batch".to_string(),
        batch_number: "BT0".to_string(),
        batch_type: mode,
        status: TransferStatus::Pending,
        total_accounts: 1,
        total_amount: "10".to_string(),
        success_count: 0,
        fail_count: 0,
        note: note.map(ToString::to_string),
        end_time: None,
        created_by: None,
        created_at: now,
        updated_at: now,
    }
}

/// Unsaved relation model (id 1, batch 1, amount 10) for pure resolution tests.
pub fn relation_model(
    source_account_id: Option<i64>,
    target_account_id: Option<i64>,
    contact_type: ContactType,
    target_identifier: Option<&str>,
) -> batch_transfer_relation::Model {
    let now = chrono::Utc::now();
    batch_transfer_relation::Model {
        id: 1,
        batch_id: 1,
        source_account_id,
        target_account_id,
        contact_type,
        target_identifier: target_identifier.map(ToString::to_string),
        amount: "10".to_string(),
        status: TransferStatus::Pending,
        transfer_id: None,
        error_message: None,
        created_at: now,
        updated_at: now,
    }
}

/// Gateway whose answer depends on the target identifier:
/// - `refuse...` is refused with [`REFUSAL_MESSAGE`] unless allowed later
/// - `explode...` fails the call itself
/// - anything else succeeds with an increasing transfer id
///
/// Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    requests: Mutex<Vec<TransferRequest>>,
    allowed: Mutex<HashSet<String>>,
}

impl ScriptedGateway {
    /// Creates a gateway with no recorded requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `identifier` succeed from now on even if it would be refused.
    pub async fn allow(&self, identifier: &str) {
        self.allowed.lock().await.insert(identifier.to_string());
    }

    /// All requests received so far, in order.
    pub async fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl TransferGateway for ScriptedGateway {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferResponse> {
        let transfer_id = {
            let mut requests = self.requests.lock().await;
            requests.push(request.clone());
            i64::try_from(requests.len()).unwrap_or(i64::MAX) + 1000
        };

        let target = request.target_identifier.as_str();
        if target.starts_with("explode") {
            return Err(Error::Gateway {
                message: "connection reset by peer".to_string(),
            });
        }
        if target.starts_with("refuse") && !self.allowed.lock().await.contains(target) {
            return Ok(TransferResponse {
                success: false,
                data: None,
                message: Some(REFUSAL_MESSAGE.to_string()),
            });
        }

        Ok(TransferResponse {
            success: true,
            data: Some(TransferData {
                transfer_id: Some(transfer_id),
            }),
            message: None,
        })
    }
}
