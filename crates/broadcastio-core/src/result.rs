//! Delivery outcome types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::ErrorCode, trace::DeliveryTrace};

/// Error describing why a delivery attempt or send failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryError {
    /// Taxonomy code used for retry decisions.
    pub code: ErrorCode,

    /// Human-readable description.
    pub message: String,

    /// Structured context, e.g. the underlying transport error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl DeliveryError {
    /// Creates an error without details.
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), details: None }
    }

    /// Attaches structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Outcome of a send, or of a single provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Whether the message was delivered.
    pub success: bool,

    /// Provider that produced this result, or [`DeliveryResult::NO_PROVIDER`]
    /// when every provider failed.
    pub provider: String,

    /// Identifier assigned by the provider on success.
    #[serde(default)]
    pub message_id: Option<String>,

    /// Why delivery failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DeliveryError>,

    /// Attempt history, present when tracing was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<DeliveryTrace>,
}

impl DeliveryResult {
    /// Provider name used on the aggregate failure result.
    pub const NO_PROVIDER: &'static str = "none";

    /// Successful delivery.
    pub fn succeeded(provider: impl Into<String>, message_id: Option<String>) -> Self {
        Self { success: true, provider: provider.into(), message_id, error: None, trace: None }
    }

    /// Failed delivery.
    pub fn failed(provider: impl Into<String>, error: DeliveryError) -> Self {
        Self {
            success: false,
            provider: provider.into(),
            message_id: None,
            error: Some(error),
            trace: None,
        }
    }

    /// Embeds an attempt trace.
    #[must_use]
    pub fn with_trace(mut self, trace: DeliveryTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Code of the attached error, if any.
    pub fn error_code(&self) -> Option<&ErrorCode> {
        self.error.as_ref().map(|error| &error.code)
    }
}
