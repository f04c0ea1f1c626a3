//! The provider contract.

use std::fmt;

use async_trait::async_trait;
use broadcastio_core::{DeliveryResult, Message, ProviderHealth};

use crate::{error::ProviderError, retry::RetryPolicy};

/// A delivery backend.
///
/// Implementations report logical failures as a failed [`DeliveryResult`]
/// and raise [`ProviderError`] only when no result could be produced.
/// `health` must never fail: probe errors are reported as an unready
/// [`ProviderHealth`] with details.
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    /// Unique, stable provider name.
    fn name(&self) -> &str;

    /// Probes provider readiness.
    async fn health(&self) -> ProviderHealth;

    /// Attempts to deliver `message`.
    async fn send(&self, message: &Message) -> Result<DeliveryResult, ProviderError>;

    /// Provider-specific retry policy, overriding the orchestrator default.
    fn retry_policy(&self) -> Option<&RetryPolicy> {
        None
    }
}
