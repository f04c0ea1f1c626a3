//! Error taxonomy for message delivery.
//!
//! Two kinds of failure exist. Delivery failures (a provider being down, a
//! gateway rejecting a message) are data: they travel inside a
//! [`DeliveryResult`](crate::DeliveryResult) tagged with an [`ErrorCode`].
//! Misuse and misconfiguration (an invalid message, an orchestrator without
//! providers, a provider rejecting its own configuration) are raised as
//! [`BroadcastioError`] and abort the send immediately.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`BroadcastioError`].
pub type Result<T> = std::result::Result<T, BroadcastioError>;

/// Machine-readable code attached to every delivery error.
///
/// Serialized in `SCREAMING_SNAKE_CASE`. Parsing also accepts the
/// `kebab-case` spelling (`provider-unavailable`) so configuration files can
/// use either. Codes outside the built-in taxonomy are preserved verbatim as
/// [`ErrorCode::Provider`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    /// Malformed message, metadata or retry policy.
    ValidationError,
    /// Attachment file or path problem.
    AttachmentError,
    /// Orchestrator misconfiguration or no usable provider.
    OrchestrationError,
    /// Transient transport or connectivity failure.
    ProviderUnavailable,
    /// Terminal failure with no more specific cause.
    AllProvidersFailed,
    /// Provider-specific code such as `WHATSAPP_REJECTED`.
    Provider(String),
}

impl ErrorCode {
    /// Returns the canonical string form of this code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::AttachmentError => "ATTACHMENT_ERROR",
            Self::OrchestrationError => "ORCHESTRATION_ERROR",
            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::AllProvidersFailed => "ALL_PROVIDERS_FAILED",
            Self::Provider(code) => code,
        }
    }

    /// Whether a retry policy without an explicit `retry_on` set retries
    /// this code. Only transient unavailability qualifies.
    pub fn is_retryable_by_default(&self) -> bool {
        matches!(self, Self::ProviderUnavailable)
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        let normalized = code.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "VALIDATION_ERROR" => Self::ValidationError,
            "ATTACHMENT_ERROR" => Self::AttachmentError,
            "ORCHESTRATION_ERROR" => Self::OrchestrationError,
            "PROVIDER_UNAVAILABLE" => Self::ProviderUnavailable,
            "ALL_PROVIDERS_FAILED" => Self::AllProvidersFailed,
            _ => Self::Provider(code),
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        Self::from(code.to_string())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Provider(code) => code,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised to the caller instead of being reported as a failed result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastioError {
    /// Message or retry policy failed validation.
    #[error("validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// Attachment file is missing or its provider path is malformed.
    #[error("attachment error: {message}")]
    Attachment {
        /// What was wrong with the attachment
        message: String,
    },

    /// Orchestrator cannot run: no providers, or none healthy under strict
    /// health gating.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Why orchestration could not proceed
        message: String,
    },

    /// A provider rejected the call as misuse of its configuration. Never
    /// retried and never falls back to another provider.
    #[error("provider {provider} rejected the request: {message}")]
    Configuration {
        /// Name of the provider that raised the error
        provider: String,
        /// Provider's description of the problem
        message: String,
    },
}

impl BroadcastioError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Creates an attachment error.
    pub fn attachment(message: impl Into<String>) -> Self {
        Self::Attachment { message: message.into() }
    }

    /// Creates an orchestration error.
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration { message: message.into() }
    }

    /// Creates a provider configuration error.
    pub fn configuration(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration { provider: provider.into(), message: message.into() }
    }

    /// Returns the taxonomy code for this error.
    ///
    /// Provider configuration errors are reported as validation errors: the
    /// provider refused the shape of what it was given.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } | Self::Configuration { .. } => ErrorCode::ValidationError,
            Self::Attachment { .. } => ErrorCode::AttachmentError,
            Self::Orchestration { .. } => ErrorCode::OrchestrationError,
        }
    }
}
