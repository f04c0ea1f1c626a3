//! Attempt records and per-send traces.
//!
//! A [`DeliveryTrace`] is opened when a traced send starts, receives one
//! [`DeliveryAttempt`] per provider invocation (and per skipped unhealthy
//! provider) in chronological order, and is sealed exactly once when the send
//! concludes. Only the orchestrator builds traces; providers never see them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::DeliveryError;

/// Record of one provider invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// Provider that was invoked.
    pub provider: String,

    /// 1-based index within that provider's retry loop.
    pub attempt: u32,

    /// When the call started.
    pub started_at: DateTime<Utc>,

    /// When the call returned.
    pub finished_at: DateTime<Utc>,

    /// `finished_at - started_at` in milliseconds, never negative.
    pub duration_ms: i64,

    /// Whether this call delivered the message.
    pub success: bool,

    /// Why the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DeliveryError>,
}

impl DeliveryAttempt {
    /// Creates an attempt record, deriving its duration from the timestamps.
    pub fn new(
        provider: impl Into<String>,
        attempt: u32,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        success: bool,
        error: Option<DeliveryError>,
    ) -> Self {
        let duration_ms = finished_at.signed_duration_since(started_at).num_milliseconds().max(0);

        Self { provider: provider.into(), attempt, started_at, finished_at, duration_ms, success, error }
    }
}

/// Ordered attempt history of one send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryTrace {
    trace_id: Uuid,
    started_at: DateTime<Utc>,
    #[serde(default)]
    finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    attempts: Vec<DeliveryAttempt>,
}

impl DeliveryTrace {
    /// Opens a new trace.
    pub fn start(started_at: DateTime<Utc>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            started_at,
            finished_at: None,
            success: None,
            attempts: Vec::new(),
        }
    }

    /// Appends an attempt. Ignored once the trace is sealed.
    pub fn record(&mut self, attempt: DeliveryAttempt) {
        if self.is_sealed() {
            return;
        }
        self.attempts.push(attempt);
    }

    /// Seals the trace with its overall outcome.
    ///
    /// Returns `false` and leaves the trace untouched if it was already
    /// sealed.
    pub fn seal(&mut self, success: bool, finished_at: DateTime<Utc>) -> bool {
        if self.is_sealed() {
            return false;
        }
        self.finished_at = Some(finished_at);
        self.success = Some(success);
        true
    }

    /// Whether the outcome has been recorded.
    pub fn is_sealed(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Unique id of this trace.
    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    /// When the send started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the send concluded.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Overall outcome, once sealed.
    pub fn success(&self) -> Option<bool> {
        self.success
    }

    /// Attempts in chronological order.
    pub fn attempts(&self) -> &[DeliveryAttempt] {
        &self.attempts
    }

    /// Provider names of the attempts in order.
    pub fn providers(&self) -> Vec<&str> {
        self.attempts.iter().map(|attempt| attempt.provider.as_str()).collect()
    }

    /// Attempts made against a single provider.
    pub fn attempts_for<'a>(
        &'a self,
        provider: &'a str,
    ) -> impl Iterator<Item = &'a DeliveryAttempt> + 'a {
        self.attempts.iter().filter(move |attempt| attempt.provider == provider)
    }
}
