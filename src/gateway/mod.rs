//! Transfer gateway - the account provider's single-transfer operation.
//!
//! The orchestrator only ever talks to a [`TransferGateway`]. Production code injects
//! [`http::HttpTransferGateway`]; tests inject a scripted in-memory implementation.

pub mod http;

use crate::entities::ContactType;
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpTransferGateway;

/// Origin tag attached to every transfer started by a batch.
pub const BATCH_TRANSFER_ORIGIN: &str = "batch";

/// One account-to-account transfer as sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    /// Paying internal account
    #[serde(rename = "accountId")]
    pub source_account_id: String,
    /// How `target_identifier` addresses the recipient
    #[serde(rename = "contactType")]
    pub contact_type: ContactType,
    /// Recipient uid, email or internal account id
    #[serde(rename = "targetIdentifier")]
    pub target_identifier: String,
    /// Decimal amount, passed through unchanged
    pub amount: String,
    /// Where the transfer was initiated
    #[serde(rename = "source")]
    pub origin: String,
    /// Skip the provider's duplicate-transfer guard
    #[serde(rename = "isForced")]
    pub force: bool,
    /// Optional memo shown on the transfer
    #[serde(rename = "remarks", skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Let the provider complete 2FA challenges automatically
    #[serde(rename = "auto2FA")]
    pub auto_2fa: bool,
}

/// Payload of a successful transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferData {
    /// Provider-side transfer id
    #[serde(rename = "transferId", default)]
    pub transfer_id: Option<i64>,
}

/// The provider's response envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResponse {
    /// Whether the transfer went through
    pub success: bool,
    /// Present on success
    #[serde(default)]
    pub data: Option<TransferData>,
    /// Failure reason, or an informational message
    #[serde(default)]
    pub message: Option<String>,
}

impl TransferResponse {
    /// Provider transfer id, if the response carried one.
    #[must_use]
    pub fn transfer_id(&self) -> Option<i64> {
        self.data.as_ref().and_then(|data| data.transfer_id)
    }
}

/// Performs single transfers at the account provider.
///
/// An `Err` means the call itself failed (transport, decoding); a refused transfer is
/// an `Ok` response with `success == false`.
#[async_trait]
pub trait TransferGateway: Send + Sync {
    /// Executes one transfer.
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferResponse>;
}
