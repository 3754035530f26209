//! Structured `{success, message, data}` envelope returned to callers of the service.

use crate::errors::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// Outward result of a service operation. Failures carry the error text and any
/// structured details instead of propagating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// Operation payload or failure details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    /// Successful response carrying `data`.
    pub fn ok<T: Serialize>(message: impl Into<String>, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                message: message.into(),
                data: Some(value),
            },
            Err(e) => Self::failure(&Error::from(e)),
        }
    }

    /// Failure response describing `error`.
    #[must_use]
    pub fn failure(error: &Error) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            data: error.details(),
        }
    }

    /// Converts an operation result, building the success message from the payload.
    pub fn from_result<T, F>(result: Result<T>, message: F) -> Self
    where
        T: Serialize,
        F: FnOnce(&T) -> String,
    {
        match result {
            Ok(data) => Self::ok(message(&data), &data),
            Err(error) => Self::failure(&error),
        }
    }

    /// Overrides the success flag, for payloads that report their own outcome.
    #[must_use]
    pub const fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }
}
