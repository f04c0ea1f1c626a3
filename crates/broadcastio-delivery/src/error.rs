//! Errors a provider may raise from `send`.
//!
//! A provider reports a logical failure (the gateway rejected the message)
//! by returning a failed [`DeliveryResult`](broadcastio_core::DeliveryResult).
//! It raises a [`ProviderError`] only when it could not produce a result at
//! all. The orchestrator classifies each variant differently: unavailability
//! is retried and falls back, misconfiguration aborts the whole send, and
//! anything unexpected falls back without retrying.

use broadcastio_core::ErrorCode;
use thiserror::Error;

/// Failure raised by a provider instead of returning a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Transport or connectivity failure: connection refused, timeout,
    /// gateway 5xx.
    #[error("provider unavailable: {message}")]
    Unavailable {
        /// Transport error description
        message: String,
    },

    /// The provider rejected the call as misuse of its configuration.
    #[error("provider misconfigured: {message}")]
    Misconfigured {
        /// What is wrong with the configuration or input
        message: String,
    },

    /// Anything else that went wrong inside the provider.
    #[error("unexpected provider failure: {message}")]
    Unexpected {
        /// Error description
        message: String,
    },
}

impl ProviderError {
    /// Creates an unavailability error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into() }
    }

    /// Creates a misconfiguration error.
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self::Misconfigured { message: message.into() }
    }

    /// Creates an unexpected-failure error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected { message: message.into() }
    }

    /// Code recorded when this error is turned into a failed attempt.
    ///
    /// Returns `None` for misconfiguration, which is never recorded as an
    /// attempt but propagated to the caller.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Unavailable { .. } => Some(ErrorCode::ProviderUnavailable),
            Self::Unexpected { .. } => Some(ErrorCode::AllProvidersFailed),
            Self::Misconfigured { .. } => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::misconfigured(err.to_string());
        }
        if err.is_decode() {
            return Self::unexpected(format!("malformed gateway response: {err}"));
        }
        // Timeouts, refused connections and broken bodies are all transient.
        Self::unavailable(err.to_string())
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(format!("{err:#}"))
    }
}
