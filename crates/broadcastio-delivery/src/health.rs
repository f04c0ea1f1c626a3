//! Health cache with optional time-to-live.
//!
//! Each orchestrator owns one cache keyed by provider name. The lock is
//! released before a provider is probed, so two concurrent sends may both
//! probe a stale provider; the later store wins.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use broadcastio_core::{Clock, ProviderHealth};
use tokio::sync::RwLock;
use tracing::debug;

use crate::provider::Provider;

#[derive(Debug, Clone)]
struct CachedHealth {
    observed_at: Instant,
    health: ProviderHealth,
}

/// Cache of provider health snapshots.
#[derive(Debug)]
pub struct HealthCache {
    ttl: Option<Duration>,
    entries: RwLock<HashMap<String, CachedHealth>>,
    clock: Arc<dyn Clock>,
}

impl HealthCache {
    /// Creates a cache. `None` disables caching so every lookup probes.
    pub fn new(ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()), clock }
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the provider's health, probing when no fresh entry exists.
    pub async fn get(&self, provider: &dyn Provider) -> ProviderHealth {
        let Some(ttl) = self.ttl else {
            return provider.health().await;
        };

        if let Some(cached) = self.entries.read().await.get(provider.name()) {
            let age = self.clock.now().saturating_duration_since(cached.observed_at);
            if age < ttl {
                return cached.health.clone();
            }
        }

        let observed_at = self.clock.now();
        let health = provider.health().await;
        debug!(provider = provider.name(), ready = health.ready, "probed provider health");

        self.entries
            .write()
            .await
            .insert(provider.name().to_string(), CachedHealth { observed_at, health: health.clone() });

        health
    }

    /// Drops the cached entry for `provider`.
    pub async fn invalidate(&self, provider: &str) -> bool {
        self.entries.write().await.remove(provider).is_some()
    }

    /// Drops every cached entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Cached snapshots, sorted by provider name.
    pub async fn snapshot(&self) -> Vec<ProviderHealth> {
        let entries = self.entries.read().await;
        let mut snapshot: Vec<ProviderHealth> =
            entries.values().map(|cached| cached.health.clone()).collect();
        snapshot.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshot
    }
}
