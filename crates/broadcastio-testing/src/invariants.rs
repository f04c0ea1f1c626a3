//! Invariants every delivery trace must satisfy.
//!
//! Each check returns an error describing the first violation, so they can
//! be used with `?` in tests and inside proptest bodies alike.

use std::collections::HashMap;

use anyhow::{bail, ensure, Context, Result};
use broadcastio_core::{DeliveryResult, DeliveryTrace};

/// Trace invariants.
pub struct Invariants;

impl Invariants {
    /// Attempts follow the declared provider order, and all attempts of one
    /// provider are contiguous.
    pub fn declaration_order(trace: &DeliveryTrace, declared: &[&str]) -> Result<()> {
        let mut last_index = 0;

        for attempt in trace.attempts() {
            let index = declared
                .iter()
                .position(|name| *name == attempt.provider)
                .with_context(|| format!("trace names unknown provider {}", attempt.provider))?;
            ensure!(
                index >= last_index,
                "provider {} attempted after {}",
                attempt.provider,
                declared[last_index]
            );
            last_index = index;
        }
        Ok(())
    }

    /// A successful attempt is the last entry of the trace.
    pub fn nothing_after_success(trace: &DeliveryTrace) -> Result<()> {
        let attempts = trace.attempts();
        if let Some(position) = attempts.iter().position(|attempt| attempt.success) {
            ensure!(
                position + 1 == attempts.len(),
                "{} attempts recorded after success on {}",
                attempts.len() - position - 1,
                attempts[position].provider
            );
        }
        Ok(())
    }

    /// Attempt numbers per provider run 1, 2, .. without gaps and never
    /// exceed `max_attempts`.
    pub fn retries_bounded(trace: &DeliveryTrace, max_attempts: &HashMap<&str, u32>) -> Result<()> {
        let mut seen: HashMap<&str, u32> = HashMap::new();

        for attempt in trace.attempts() {
            let count = seen.entry(attempt.provider.as_str()).or_insert(0);
            *count += 1;
            ensure!(
                attempt.attempt == *count,
                "provider {} attempt numbered {} but is attempt {}",
                attempt.provider,
                attempt.attempt,
                count
            );

            if let Some(max) = max_attempts.get(attempt.provider.as_str()) {
                ensure!(
                    *count <= *max,
                    "provider {} attempted {} times, max is {}",
                    attempt.provider,
                    count,
                    max
                );
            }
        }
        Ok(())
    }

    /// Every attempt has a non-negative duration matching its timestamps.
    pub fn durations_consistent(trace: &DeliveryTrace) -> Result<()> {
        for attempt in trace.attempts() {
            ensure!(attempt.duration_ms >= 0, "negative duration on {}", attempt.provider);
            ensure!(
                attempt.finished_at >= attempt.started_at,
                "attempt on {} finished before it started",
                attempt.provider
            );
            ensure!(attempt.success == attempt.error.is_none(), "success and error disagree");
        }
        Ok(())
    }

    /// The embedded trace is sealed with the same outcome as the result.
    pub fn sealed_with_result(result: &DeliveryResult) -> Result<()> {
        let Some(trace) = &result.trace else {
            bail!("result carries no trace");
        };

        ensure!(trace.is_sealed(), "trace {} was not sealed", trace.trace_id());
        ensure!(
            trace.success() == Some(result.success),
            "trace outcome {:?} differs from result outcome {}",
            trace.success(),
            result.success
        );
        if let Some(finished_at) = trace.finished_at() {
            ensure!(finished_at >= trace.started_at(), "trace finished before it started");
        }
        Ok(())
    }

    /// Runs every check that needs no per-test configuration.
    pub fn check_all(result: &DeliveryResult, declared: &[&str]) -> Result<()> {
        Self::sealed_with_result(result)?;
        let Some(trace) = &result.trace else {
            bail!("result carries no trace");
        };

        Self::declaration_order(trace, declared)?;
        Self::nothing_after_success(trace)?;
        Self::retries_bounded(trace, &HashMap::new())?;
        Self::durations_consistent(trace)
    }
}
