//! Configuration management for the broadcastio front end.

use std::{path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use broadcastio_core::DeliveryHooks;
use broadcastio_delivery::{
    DummyProvider, Orchestrator, RetryPolicy, WhatsAppConfig, WhatsAppProvider,
};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default configuration file, resolved against the working directory.
pub const CONFIG_FILE: &str = "broadcastio.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "BROADCASTIO_";

/// Delivery configuration with defaults, file, and environment overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables prefixed `BROADCASTIO_` (highest priority)
/// 2. Configuration file (`broadcastio.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Nested retry settings use a double underscore in environment variables,
/// e.g. `BROADCASTIO_RETRY__MAX_ATTEMPTS=3`.
///
/// # Example
///
/// ```no_run
/// use broadcastio::Config;
///
/// let config = Config::load().expect("failed to load configuration");
/// println!("whatsapp gateway: {:?}", config.whatsapp_url);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// WhatsApp gateway base URL. The WhatsApp provider is enabled only when
    /// this is set.
    ///
    /// Environment variable: `BROADCASTIO_WHATSAPP_URL`
    #[serde(default)]
    pub whatsapp_url: Option<String>,

    /// Timeout for gateway requests in seconds.
    ///
    /// Environment variable: `BROADCASTIO_WHATSAPP_TIMEOUT_SECONDS`
    #[serde(default = "default_whatsapp_timeout")]
    pub whatsapp_timeout_seconds: u64,

    /// Whether the dummy provider is appended as the last fallback.
    ///
    /// Environment variable: `BROADCASTIO_DUMMY_ENABLED`
    #[serde(default = "default_dummy_enabled")]
    pub dummy_enabled: bool,

    /// Health cache lifetime in seconds. Zero probes on every send.
    ///
    /// Environment variable: `BROADCASTIO_HEALTH_TTL_SECONDS`
    #[serde(default = "default_health_ttl")]
    pub health_ttl_seconds: u64,

    /// Fail a send outright when no provider is healthy.
    ///
    /// Environment variable: `BROADCASTIO_REQUIRE_HEALTHY`
    #[serde(default)]
    pub require_healthy: bool,

    /// Default retry policy for every provider.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Log filter used when `RUST_LOG` is not set.
    ///
    /// Environment variable: `BROADCASTIO_RUST_LOG`
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

impl Config {
    /// Loads configuration from defaults, `broadcastio.toml` and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result fails
    /// validation.
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Like [`Config::load`], reading the file at `path` instead. A missing
    /// file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result fails
    /// validation.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Health cache TTL, `None` when caching is disabled.
    pub fn health_ttl(&self) -> Option<Duration> {
        (self.health_ttl_seconds > 0).then(|| Duration::from_secs(self.health_ttl_seconds))
    }

    /// Gateway client settings, if the WhatsApp provider is enabled.
    pub fn to_whatsapp_config(&self) -> Option<WhatsAppConfig> {
        self.whatsapp_url.as_ref().map(|url| WhatsAppConfig {
            base_url: url.clone(),
            timeout: Duration::from_secs(self.whatsapp_timeout_seconds),
            ..WhatsAppConfig::default()
        })
    }

    /// Builds an orchestrator: WhatsApp first when configured, dummy last
    /// when enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway client cannot be built.
    pub fn to_orchestrator(&self, hooks: DeliveryHooks) -> Result<Orchestrator> {
        let mut builder = Orchestrator::builder()
            .retry_policy(self.retry.clone())
            .health_ttl(self.health_ttl())
            .require_healthy(self.require_healthy)
            .hooks(hooks);

        if let Some(whatsapp) = self.to_whatsapp_config() {
            let provider =
                WhatsAppProvider::new(whatsapp).context("failed to create whatsapp provider")?;
            builder = builder.provider(provider);
        }
        if self.dummy_enabled {
            builder = builder.provider(DummyProvider::new());
        }

        builder.build().context("failed to build orchestrator")
    }

    fn validate(&self) -> Result<()> {
        if self.whatsapp_url.is_none() && !self.dummy_enabled {
            bail!("no provider enabled: set whatsapp_url or enable the dummy provider");
        }

        if let Some(url) = &self.whatsapp_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("whatsapp_url must be an http(s) URL, got {url:?}");
            }
        }

        if self.whatsapp_timeout_seconds == 0 {
            bail!("whatsapp_timeout_seconds must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            whatsapp_url: None,
            whatsapp_timeout_seconds: default_whatsapp_timeout(),
            dummy_enabled: default_dummy_enabled(),
            health_ttl_seconds: default_health_ttl(),
            require_healthy: false,
            retry: RetryPolicy::default(),
            rust_log: default_log_level(),
        }
    }
}

fn default_whatsapp_timeout() -> u64 {
    10
}

fn default_dummy_enabled() -> bool {
    true
}

fn default_health_ttl() -> u64 {
    30
}

fn default_log_level() -> String {
    "info,broadcastio=debug".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_dummy_only() {
        let config = Config::default();
        config.validate().unwrap();

        assert_eq!(config.health_ttl(), Some(Duration::from_secs(30)));
        assert!(config.to_whatsapp_config().is_none());

        let orchestrator = config.to_orchestrator(DeliveryHooks::default()).unwrap();
        assert_eq!(orchestrator.provider_names(), vec!["dummy"]);
    }

    #[test]
    fn zero_ttl_disables_cache() {
        let config = Config { health_ttl_seconds: 0, ..Config::default() };
        assert_eq!(config.health_ttl(), None);
    }

    #[test]
    fn no_provider_rejected() {
        let config = Config { dummy_enabled: false, ..Config::default() };
        assert!(config.validate().unwrap_err().to_string().contains("no provider enabled"));
    }

    #[test]
    fn non_http_gateway_rejected() {
        let config = Config { whatsapp_url: Some("localhost:3000".to_string()), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn whatsapp_precedes_dummy() {
        let config = Config {
            whatsapp_url: Some("http://localhost:3000".to_string()),
            whatsapp_timeout_seconds: 3,
            ..Config::default()
        };

        let whatsapp = config.to_whatsapp_config().unwrap();
        assert_eq!(whatsapp.timeout, Duration::from_secs(3));

        let orchestrator = config.to_orchestrator(DeliveryHooks::default()).unwrap();
        assert_eq!(orchestrator.provider_names(), vec!["whatsapp", "dummy"]);
    }
}
