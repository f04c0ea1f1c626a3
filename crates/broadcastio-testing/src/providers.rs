//! Providers with scripted behavior.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, PoisonError,
    },
};

use async_trait::async_trait;
use broadcastio_core::{DeliveryError, DeliveryResult, ErrorCode, Message, ProviderHealth};
use broadcastio_delivery::{Provider, ProviderError, RetryPolicy};
use chrono::Utc;

/// Reference id that makes [`LogicalFailProvider`] reject a message.
pub const FORCE_LOGICAL_FAIL: &str = "FORCE_LOGICAL_FAIL";

/// Outcome of one scripted `send` call.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return a successful result.
    Succeed,
    /// Return a failed result carrying this error.
    Reject(DeliveryError),
    /// Raise `ProviderError::Unavailable`.
    Unavailable,
    /// Raise `ProviderError::Unexpected`.
    Unexpected,
    /// Raise `ProviderError::Misconfigured`.
    Misconfigured,
    /// Panic inside `send`.
    Panic,
}

/// Provider that replays a script of outcomes.
///
/// Once the script is used up every further call repeats the final step.
#[derive(Debug)]
pub struct ScriptedProvider {
    name: String,
    ready: AtomicBool,
    script: Mutex<VecDeque<Step>>,
    then: Step,
    retry_policy: Option<RetryPolicy>,
    send_calls: AtomicUsize,
    health_calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Healthy provider that plays `script`, then repeats `then`.
    pub fn scripted(name: impl Into<String>, script: Vec<Step>, then: Step) -> Self {
        Self {
            name: name.into(),
            ready: AtomicBool::new(true),
            script: Mutex::new(script.into()),
            then,
            retry_policy: None,
            send_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
        }
    }

    /// Always succeeds.
    pub fn succeeding(name: impl Into<String>) -> Self {
        Self::scripted(name, Vec::new(), Step::Succeed)
    }

    /// Always unavailable.
    pub fn failing(name: impl Into<String>) -> Self {
        Self::scripted(name, Vec::new(), Step::Unavailable)
    }

    /// Always returns a logical failure with `code`.
    pub fn rejecting(name: impl Into<String>, code: impl Into<ErrorCode>) -> Self {
        let step = Step::Reject(DeliveryError::new(code, "rejected by scripted provider"));
        Self::scripted(name, Vec::new(), step)
    }

    /// Unavailable for the first `failures` calls, then succeeds.
    pub fn flaky(name: impl Into<String>, failures: usize) -> Self {
        Self::scripted(name, vec![Step::Unavailable; failures], Step::Succeed)
    }

    /// Reports unhealthy; sends succeed if attempted anyway.
    pub fn unhealthy(name: impl Into<String>) -> Self {
        let provider = Self::succeeding(name);
        provider.set_ready(false);
        provider
    }

    /// Sets a provider-specific retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Changes what the next health probe reports.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Number of `send` calls so far.
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// Number of health probes so far.
    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        script.pop_front().unwrap_or_else(|| self.then.clone())
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health(&self) -> ProviderHealth {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if self.ready.load(Ordering::SeqCst) {
            ProviderHealth::ready(&self.name, Utc::now())
        } else {
            ProviderHealth::unavailable(&self.name, Utc::now(), "scripted outage")
        }
    }

    async fn send(&self, _message: &Message) -> Result<DeliveryResult, ProviderError> {
        let call = self.send_calls.fetch_add(1, Ordering::SeqCst) + 1;

        match self.next_step() {
            Step::Succeed => {
                Ok(DeliveryResult::succeeded(&self.name, Some(format!("{}-{call}", self.name))))
            },
            Step::Reject(error) => Ok(DeliveryResult::failed(&self.name, error)),
            Step::Unavailable => Err(ProviderError::unavailable("connection refused")),
            Step::Unexpected => Err(ProviderError::unexpected("scripted failure")),
            Step::Misconfigured => Err(ProviderError::misconfigured("missing api token")),
            Step::Panic => panic!("scripted provider {} panicked", self.name),
        }
    }

    fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }
}

/// Gateway stand-in that rejects messages whose reference id is
/// [`FORCE_LOGICAL_FAIL`] with `WHATSAPP_REJECTED`, and accepts all others.
#[derive(Debug)]
pub struct LogicalFailProvider {
    name: String,
    send_calls: AtomicUsize,
}

impl LogicalFailProvider {
    /// Creates the provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), send_calls: AtomicUsize::new(0) }
    }

    /// Number of `send` calls so far.
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for LogicalFailProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health(&self) -> ProviderHealth {
        ProviderHealth::ready(&self.name, Utc::now())
    }

    async fn send(&self, message: &Message) -> Result<DeliveryResult, ProviderError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);

        if message.reference_id() == FORCE_LOGICAL_FAIL {
            return Ok(DeliveryResult::failed(
                &self.name,
                DeliveryError::new("WHATSAPP_REJECTED", "Forced logical failure for testing"),
            ));
        }

        Ok(DeliveryResult::succeeded(&self.name, Some(format!("{}-ok", self.name))))
    }
}
