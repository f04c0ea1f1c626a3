//! Observer callbacks fired during a send.
//!
//! Hooks are fire-and-forget observers. An error returned by a hook, or a
//! panic inside one, is caught and discarded: it never changes the outcome of
//! the send and is not reported anywhere.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{result::DeliveryResult, trace::DeliveryAttempt};

/// Callback receiving each completed provider attempt.
pub type AttemptHook = Arc<dyn Fn(&DeliveryAttempt) -> anyhow::Result<()> + Send + Sync>;

/// Callback receiving the final result of a send.
pub type ResultHook = Arc<dyn Fn(&DeliveryResult) -> anyhow::Result<()> + Send + Sync>;

/// The three optional observers of a send.
#[derive(Clone, Default)]
pub struct DeliveryHooks {
    on_attempt: Option<AttemptHook>,
    on_success: Option<ResultHook>,
    on_failure: Option<ResultHook>,
}

impl DeliveryHooks {
    /// Creates an empty set of hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-attempt observer.
    #[must_use]
    pub fn on_attempt<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeliveryAttempt) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_attempt = Some(Arc::new(hook));
        self
    }

    /// Sets the observer of successful sends.
    #[must_use]
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeliveryResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    /// Sets the observer of failed sends.
    #[must_use]
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeliveryResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    /// Fires the per-attempt observer.
    pub fn attempt(&self, attempt: &DeliveryAttempt) {
        call_quietly(self.on_attempt.as_deref(), attempt);
    }

    /// Fires the success observer.
    pub fn success(&self, result: &DeliveryResult) {
        call_quietly(self.on_success.as_deref(), result);
    }

    /// Fires the failure observer.
    pub fn failure(&self, result: &DeliveryResult) {
        call_quietly(self.on_failure.as_deref(), result);
    }
}

impl fmt::Debug for DeliveryHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryHooks")
            .field("on_attempt", &self.on_attempt.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

fn call_quietly<T: ?Sized>(
    hook: Option<&(dyn Fn(&T) -> anyhow::Result<()> + Send + Sync)>,
    arg: &T,
) {
    let Some(hook) = hook else {
        return;
    };
    // Both a returned error and an unwinding panic are dropped here.
    let _ = panic::catch_unwind(AssertUnwindSafe(|| hook(arg)));
}
