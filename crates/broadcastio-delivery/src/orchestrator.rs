//! Multi-provider delivery orchestration.
//!
//! A send walks the configured providers in declaration order. Each provider
//! gets up to `max_attempts` tries under its effective retry policy; the
//! first successful result ends the send. When every provider is exhausted
//! the caller receives an aggregate failure result attributed to `"none"`.
//!
//! Delivery failures are data. Only validation problems, strict health
//! gating with no healthy provider, and provider misconfiguration are raised
//! as errors.

use std::{any::Any, collections::HashSet, fmt, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use broadcastio_core::{
    BroadcastioError, Clock, DeliveryAttempt, DeliveryError, DeliveryHooks, DeliveryResult,
    DeliveryTrace, ErrorCode, Message, ProviderHealth, RealClock, Result,
};
use futures::FutureExt;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::ProviderError, health::HealthCache, provider::Provider, retry::RetryPolicy,
    validate::validate_message, DEFAULT_HEALTH_TTL,
};

/// Coordinates delivery across an ordered list of providers.
///
/// `Orchestrator` is `Send + Sync`; concurrent sends share only the health
/// cache.
pub struct Orchestrator {
    providers: Vec<Arc<dyn Provider>>,
    retry_policy: RetryPolicy,
    require_healthy: bool,
    health: HealthCache,
    hooks: DeliveryHooks,
    clock: Arc<dyn Clock>,
}

/// A provider selected for a send, with the health that disqualified it if
/// it is only listed to keep the trace in declaration order.
struct Candidate<'a> {
    provider: &'a dyn Provider,
    unhealthy: Option<ProviderHealth>,
}

impl Orchestrator {
    /// Starts building an orchestrator.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Provider names in declaration order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// The orchestrator's health cache.
    pub fn health_cache(&self) -> &HealthCache {
        &self.health
    }

    /// Default retry policy for providers without their own.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Sends `message`, falling back across providers.
    ///
    /// With `trace` set the returned result embeds the sealed attempt
    /// history.
    ///
    /// # Errors
    ///
    /// - `Validation` or `Attachment` when the message is rejected before
    ///   any provider is contacted
    /// - `Orchestration` when `require_healthy` is set and no provider is
    ///   healthy
    /// - `Configuration` when a provider reports it is misconfigured
    #[instrument(
        name = "broadcast_send",
        skip_all,
        fields(reference_id = %message.reference_id(), trace = trace)
    )]
    pub async fn send(&self, message: &Message, trace: bool) -> Result<DeliveryResult> {
        validate_message(message).await?;

        let mut trace = trace.then(|| DeliveryTrace::start(self.clock.now_utc()));
        let candidates = self.select_providers().await?;
        let mut last_error: Option<DeliveryError> = None;

        for candidate in candidates {
            if let Some(health) = candidate.unhealthy {
                if let Some(trace) = trace.as_mut() {
                    trace.record(self.skip_record(candidate.provider.name(), &health));
                }
                continue;
            }

            let Some(mut result) =
                self.try_provider(candidate.provider, message, &mut trace, &mut last_error).await?
            else {
                continue;
            };

            if let Some(mut trace) = trace.take() {
                trace.seal(true, self.clock.now_utc());
                result.trace = Some(trace);
            }

            info!(
                provider = %result.provider,
                message_id = result.message_id.as_deref().unwrap_or_default(),
                "message delivered"
            );
            self.hooks.success(&result);
            return Ok(result);
        }

        let error = last_error.unwrap_or_else(|| {
            DeliveryError::new(ErrorCode::AllProvidersFailed, "all providers failed")
        });
        warn!(code = %error.code, error = %error.message, "all providers failed");

        let mut result = DeliveryResult::failed(DeliveryResult::NO_PROVIDER, error);
        if let Some(mut trace) = trace.take() {
            trace.seal(false, self.clock.now_utc());
            result.trace = Some(trace);
        }

        self.hooks.failure(&result);
        Ok(result)
    }

    /// Probes every provider and decides which ones to try.
    async fn select_providers(&self) -> Result<Vec<Candidate<'_>>> {
        let mut candidates = Vec::with_capacity(self.providers.len());
        let mut healthy = 0;

        for provider in &self.providers {
            let health = self.health.get(provider.as_ref()).await;
            if health.ready {
                healthy += 1;
                candidates.push(Candidate { provider: provider.as_ref(), unhealthy: None });
            } else {
                warn!(
                    provider = provider.name(),
                    details = health.details.as_deref().unwrap_or_default(),
                    "skipping unhealthy provider"
                );
                candidates.push(Candidate { provider: provider.as_ref(), unhealthy: Some(health) });
            }
        }

        if healthy > 0 {
            return Ok(candidates);
        }

        if self.require_healthy {
            return Err(BroadcastioError::orchestration("no healthy providers available"));
        }

        warn!("no provider reported healthy, attempting all providers");
        for candidate in &mut candidates {
            candidate.unhealthy = None;
        }
        Ok(candidates)
    }

    /// Runs the retry loop for one provider.
    ///
    /// Returns the successful result, or `None` once the provider is
    /// exhausted or hit a non-retryable failure.
    async fn try_provider(
        &self,
        provider: &dyn Provider,
        message: &Message,
        trace: &mut Option<DeliveryTrace>,
        last_error: &mut Option<DeliveryError>,
    ) -> Result<Option<DeliveryResult>> {
        let policy = provider.retry_policy().unwrap_or(&self.retry_policy);
        let max_attempts = policy.max_attempts();

        for index in 0..max_attempts {
            let attempt_number = index + 1;
            let started_at = self.clock.now_utc();
            let result = self.invoke(provider, message).await?;
            let finished_at = self.clock.now_utc();

            let attempt = DeliveryAttempt::new(
                provider.name(),
                attempt_number,
                started_at,
                finished_at,
                result.success,
                result.error.clone(),
            );
            debug!(
                provider = provider.name(),
                attempt = attempt_number,
                success = result.success,
                duration_ms = attempt.duration_ms,
                "provider attempt finished"
            );
            self.hooks.attempt(&attempt);
            if let Some(trace) = trace.as_mut() {
                trace.record(attempt);
            }

            if result.success {
                return Ok(Some(result));
            }

            let error = result.error.unwrap_or_else(missing_error);
            let retry = attempt_number < max_attempts && policy.should_retry(&error.code);
            warn!(
                provider = provider.name(),
                attempt = attempt_number,
                code = %error.code,
                error = %error.message,
                retry,
                "provider attempt failed"
            );
            *last_error = Some(error);

            if !retry {
                break;
            }

            let delay = policy.delay_for(index);
            if !delay.is_zero() {
                self.clock.sleep(delay).await;
            }
        }

        Ok(None)
    }

    /// Calls the provider once and classifies the outcome.
    async fn invoke(&self, provider: &dyn Provider, message: &Message) -> Result<DeliveryResult> {
        let name = provider.name();
        let outcome = AssertUnwindSafe(provider.send(message)).catch_unwind().await;

        let result = match outcome {
            Ok(Ok(result)) => normalize(name, result),
            Ok(Err(ProviderError::Misconfigured { message })) => {
                return Err(BroadcastioError::configuration(name, message));
            },
            Ok(Err(ProviderError::Unavailable { message })) => DeliveryResult::failed(
                name,
                DeliveryError::new(ErrorCode::ProviderUnavailable, format!("{name} service unavailable"))
                    .with_details(json!({ "exception": message })),
            ),
            Ok(Err(ProviderError::Unexpected { message })) => DeliveryResult::failed(
                name,
                DeliveryError::new(ErrorCode::AllProvidersFailed, format!("{name} failed unexpectedly"))
                    .with_details(json!({ "exception": message })),
            ),
            Err(panic) => DeliveryResult::failed(
                name,
                DeliveryError::new(ErrorCode::AllProvidersFailed, format!("{name} panicked"))
                    .with_details(json!({ "exception": panic_message(panic.as_ref()) })),
            ),
        };

        Ok(result)
    }

    fn skip_record(&self, provider: &str, health: &ProviderHealth) -> DeliveryAttempt {
        let now = self.clock.now_utc();
        let error = DeliveryError::new(ErrorCode::ProviderUnavailable, "provider reported unhealthy")
            .with_details(json!({ "skipped": true, "health": health.details }));

        DeliveryAttempt::new(provider, 1, now, now, false, Some(error))
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.provider_names())
            .field("retry_policy", &self.retry_policy)
            .field("require_healthy", &self.require_healthy)
            .field("health_ttl", &self.health.ttl())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Fills in what a provider left out and strips anything it must not set.
fn normalize(provider: &str, mut result: DeliveryResult) -> DeliveryResult {
    result.trace = None;
    if result.provider.is_empty() {
        result.provider = provider.to_string();
    }
    if !result.success && result.error.is_none() {
        result.error = Some(missing_error());
    }
    result
}

fn missing_error() -> DeliveryError {
    DeliveryError::new(ErrorCode::AllProvidersFailed, "provider reported failure without an error")
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    providers: Vec<Arc<dyn Provider>>,
    retry_policy: RetryPolicy,
    health_ttl: Option<Duration>,
    require_healthy: bool,
    hooks: DeliveryHooks,
    clock: Arc<dyn Clock>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            retry_policy: RetryPolicy::default(),
            health_ttl: Some(DEFAULT_HEALTH_TTL),
            require_healthy: false,
            hooks: DeliveryHooks::default(),
            clock: Arc::new(RealClock::new()),
        }
    }
}

impl OrchestratorBuilder {
    /// Appends a provider. Declaration order is fallback order.
    #[must_use]
    pub fn provider<P: Provider + 'static>(self, provider: P) -> Self {
        self.provider_arc(Arc::new(provider))
    }

    /// Appends a shared provider.
    #[must_use]
    pub fn provider_arc(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Appends several shared providers.
    #[must_use]
    pub fn providers<I>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Provider>>,
    {
        self.providers.extend(providers);
        self
    }

    /// Default retry policy for providers that have none.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Health cache TTL. `None` probes on every send.
    #[must_use]
    pub fn health_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.health_ttl = ttl;
        self
    }

    /// Whether a send with no healthy provider is an error.
    #[must_use]
    pub fn require_healthy(mut self, require_healthy: bool) -> Self {
        self.require_healthy = require_healthy;
        self
    }

    /// Observer of every provider attempt.
    #[must_use]
    pub fn on_attempt<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeliveryAttempt) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_attempt(hook);
        self
    }

    /// Observer of successful sends.
    #[must_use]
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeliveryResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_success(hook);
        self
    }

    /// Observer of failed sends.
    #[must_use]
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeliveryResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_failure(hook);
        self
    }

    /// Replaces all hooks at once.
    #[must_use]
    pub fn hooks(mut self, hooks: DeliveryHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Clock used for timestamps, cache ages and backoff sleeps.
    #[must_use]
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns `Orchestration` when no provider was added or two providers
    /// share a name.
    pub fn build(self) -> Result<Orchestrator> {
        if self.providers.is_empty() {
            return Err(BroadcastioError::orchestration(
                "orchestrator requires at least one provider",
            ));
        }

        let mut names = HashSet::new();
        for provider in &self.providers {
            if !names.insert(provider.name()) {
                return Err(BroadcastioError::orchestration(format!(
                    "duplicate provider name: {}",
                    provider.name()
                )));
            }
        }

        Ok(Orchestrator {
            providers: self.providers,
            retry_policy: self.retry_policy,
            require_healthy: self.require_healthy,
            health: HealthCache::new(self.health_ttl, Arc::clone(&self.clock)),
            hooks: self.hooks,
            clock: self.clock,
        })
    }
}

impl fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("providers", &self.providers)
            .field("retry_policy", &self.retry_policy)
            .field("health_ttl", &self.health_ttl)
            .field("require_healthy", &self.require_healthy)
            .finish_non_exhaustive()
    }
}
