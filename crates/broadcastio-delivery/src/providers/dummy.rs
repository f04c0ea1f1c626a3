//! Provider that accepts every message without delivering it.

use async_trait::async_trait;
use broadcastio_core::{DeliveryResult, Message, ProviderHealth};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::{error::ProviderError, provider::Provider, retry::RetryPolicy};

/// Always healthy, always successful. Useful as a last-resort fallback in
/// development and as a stand-in when no gateway is running.
#[derive(Debug, Clone, Default)]
pub struct DummyProvider {
    retry_policy: Option<RetryPolicy>,
}

impl DummyProvider {
    /// Provider name.
    pub const NAME: &'static str = "dummy";

    /// Creates the provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the orchestrator's retry policy for this provider.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }
}

#[async_trait]
impl Provider for DummyProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn health(&self) -> ProviderHealth {
        ProviderHealth::ready(Self::NAME, Utc::now())
    }

    async fn send(&self, message: &Message) -> Result<DeliveryResult, ProviderError> {
        let message_id = format!("{}-{}", Self::NAME, Uuid::new_v4());
        debug!(
            recipient = %message.recipient,
            reference_id = message.reference_id(),
            message_id = %message_id,
            "dummy provider accepted message"
        );

        Ok(DeliveryResult::succeeded(Self::NAME, Some(message_id)))
    }

    fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }
}
