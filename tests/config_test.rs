//! Configuration layering tests: defaults, file, then environment.

use std::time::Duration;

use broadcastio::{BackoffStrategy, Config, ErrorCode};
use figment::Jail;

#[test]
fn defaults_apply_without_file_or_env() {
    Jail::expect_with(|_jail| {
        let config = Config::load().map_err(|e| format!("{e:#}"))?;

        assert_eq!(config.whatsapp_url, None);
        assert_eq!(config.whatsapp_timeout_seconds, 10);
        assert!(config.dummy_enabled);
        assert_eq!(config.health_ttl(), Some(Duration::from_secs(30)));
        assert!(!config.require_healthy);
        assert_eq!(config.retry.max_attempts(), 1);
        assert_eq!(config.rust_log, "info,broadcastio=debug");
        Ok(())
    });
}

#[test]
fn file_values_override_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "broadcastio.toml",
            r#"
                whatsapp_url = "http://gateway:3000"
                health_ttl_seconds = 0
                require_healthy = true

                [retry]
                max_attempts = 3
                backoff = "exponential"
                base_delay_ms = 500
                max_delay_ms = 4000
                retry_on = ["PROVIDER_UNAVAILABLE", "WHATSAPP_REJECTED"]
            "#,
        )?;

        let config = Config::load().map_err(|e| format!("{e:#}"))?;

        assert_eq!(config.whatsapp_url.as_deref(), Some("http://gateway:3000"));
        assert_eq!(config.health_ttl(), None);
        assert!(config.require_healthy);
        assert_eq!(config.retry.max_attempts(), 3);
        assert_eq!(config.retry.backoff(), BackoffStrategy::Exponential);
        assert_eq!(config.retry.delay_for(1), Duration::from_secs(1));
        assert!(config.retry.should_retry(&ErrorCode::from("WHATSAPP_REJECTED")));
        Ok(())
    });
}

#[test]
fn environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "broadcastio.toml",
            r#"
                whatsapp_url = "http://gateway:3000"
                whatsapp_timeout_seconds = 20

                [retry]
                max_attempts = 3
            "#,
        )?;
        jail.set_env("BROADCASTIO_WHATSAPP_TIMEOUT_SECONDS", "5");
        jail.set_env("BROADCASTIO_DUMMY_ENABLED", "false");
        jail.set_env("BROADCASTIO_RETRY__MAX_ATTEMPTS", "4");

        let config = Config::load().map_err(|e| format!("{e:#}"))?;

        assert_eq!(config.whatsapp_timeout_seconds, 5);
        assert!(!config.dummy_enabled);
        assert_eq!(config.retry.max_attempts(), 4);
        Ok(())
    });
}

#[test]
fn invalid_retry_policy_rejected_at_load() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "broadcastio.toml",
            r#"
                [retry]
                max_attempts = 2
                base_delay_ms = 1000
                max_delay_ms = 10
            "#,
        )?;

        assert!(Config::load().is_err());
        Ok(())
    });
}

#[test]
fn configuration_without_providers_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("BROADCASTIO_DUMMY_ENABLED", "false");

        let err = Config::load().unwrap_err();
        assert!(format!("{err:#}").contains("no provider enabled"));
        Ok(())
    });
}

#[test]
fn explicit_file_path_is_used() {
    Jail::expect_with(|jail| {
        jail.create_file("custom.toml", "whatsapp_url = \"https://wa.example.com\"")?;

        let config = Config::load_from("custom.toml").map_err(|e| format!("{e:#}"))?;
        assert_eq!(config.whatsapp_url.as_deref(), Some("https://wa.example.com"));
        Ok(())
    });
}
