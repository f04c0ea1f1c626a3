//! Per-provider retry policies.
//!
//! A policy bounds how many times one provider is tried for one send, how
//! long to wait between tries, and which error codes are worth retrying.
//! Policies are validated when built, including when they are deserialized
//! from configuration, so an invalid policy can never reach the send path.

use std::{collections::HashSet, time::Duration};

use broadcastio_core::{BroadcastioError, ErrorCode, Result};
use serde::{Deserialize, Serialize};

/// Shape of the delay between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Retry immediately.
    #[default]
    None,
    /// Wait `base_delay` between attempts.
    Fixed,
    /// Wait `base_delay * 2^i` after the attempt with zero-based index `i`.
    Exponential,
}

/// Retry policy for a single provider.
///
/// The default policy makes exactly one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRetryPolicy", into = "RawRetryPolicy")]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffStrategy,
    base_delay: Duration,
    max_delay: Option<Duration>,
    retry_on: Option<HashSet<ErrorCode>>,
}

impl RetryPolicy {
    /// Policy with a single attempt and no backoff.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffStrategy::None,
            base_delay: Duration::ZERO,
            max_delay: None,
            retry_on: None,
        }
    }

    /// Policy with `max_attempts` immediate attempts.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `max_attempts` is zero.
    pub fn new(max_attempts: u32) -> Result<Self> {
        Self::builder().max_attempts(max_attempts).build()
    }

    /// Starts building a policy.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff shape.
    pub fn backoff(&self) -> BackoffStrategy {
        self.backoff
    }

    /// Base delay.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on any single delay.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Explicit retryable codes, if configured.
    pub fn retry_on(&self) -> Option<&HashSet<ErrorCode>> {
        self.retry_on.as_ref()
    }

    /// Whether a failure with `code` may be retried under this policy.
    ///
    /// Without an explicit `retry_on` set only `PROVIDER_UNAVAILABLE` is
    /// retryable.
    pub fn should_retry(&self, code: &ErrorCode) -> bool {
        match &self.retry_on {
            Some(codes) => codes.contains(code),
            None => code.is_retryable_by_default(),
        }
    }

    /// Delay to wait after the attempt with zero-based index `attempt_index`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let delay = match self.backoff {
            BackoffStrategy::None => return Duration::ZERO,
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                self.base_delay.saturating_mul(2_u32.saturating_pow(attempt_index))
            },
        };

        match self.max_delay {
            Some(max_delay) => delay.min(max_delay),
            None => delay,
        }
    }

    fn validate(self) -> Result<Self> {
        if self.max_attempts < 1 {
            return Err(BroadcastioError::validation("retry policy max_attempts must be >= 1"));
        }

        if let Some(max_delay) = self.max_delay {
            if max_delay < self.base_delay {
                return Err(BroadcastioError::validation(format!(
                    "retry policy max_delay ({max_delay:?}) must be >= base_delay ({:?})",
                    self.base_delay
                )));
            }
        }

        Ok(self)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self { policy: RetryPolicy::no_retry() }
    }
}

impl RetryPolicyBuilder {
    /// Total attempts, including the first. Must be at least 1.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    /// Backoff shape.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.policy.backoff = backoff;
        self
    }

    /// Base delay for fixed and exponential backoff.
    #[must_use]
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.policy.base_delay = base_delay;
        self
    }

    /// Cap on any single delay. Must not be below the base delay.
    #[must_use]
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.policy.max_delay = Some(max_delay);
        self
    }

    /// Replaces the default retryable set.
    #[must_use]
    pub fn retry_on<I, C>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ErrorCode>,
    {
        self.policy.retry_on = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    /// Validates and returns the policy.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `max_attempts` is zero or `max_delay`
    /// is below `base_delay`.
    pub fn build(self) -> Result<RetryPolicy> {
        self.policy.validate()
    }
}

/// Serialized form of [`RetryPolicy`], with delays in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRetryPolicy {
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default)]
    backoff: BackoffStrategy,
    #[serde(default)]
    base_delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry_on: Option<Vec<ErrorCode>>,
}

fn default_max_attempts() -> u32 {
    1
}

impl TryFrom<RawRetryPolicy> for RetryPolicy {
    type Error = BroadcastioError;

    fn try_from(raw: RawRetryPolicy) -> Result<Self> {
        let mut builder = RetryPolicy::builder()
            .max_attempts(raw.max_attempts)
            .backoff(raw.backoff)
            .base_delay(Duration::from_millis(raw.base_delay_ms));

        if let Some(max_delay_ms) = raw.max_delay_ms {
            builder = builder.max_delay(Duration::from_millis(max_delay_ms));
        }
        if let Some(codes) = raw.retry_on {
            builder = builder.retry_on(codes);
        }

        builder.build()
    }
}

impl From<RetryPolicy> for RawRetryPolicy {
    fn from(policy: RetryPolicy) -> Self {
        let to_ms = |duration: Duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

        let retry_on = policy.retry_on.map(|codes| {
            let mut codes: Vec<ErrorCode> = codes.into_iter().collect();
            codes.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            codes
        });

        Self {
            max_attempts: policy.max_attempts,
            backoff: policy.backoff,
            base_delay_ms: to_ms(policy.base_delay),
            max_delay_ms: policy.max_delay.map(to_ms),
            retry_on,
        }
    }
}
