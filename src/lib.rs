//! broadcastio: deliver messages through an ordered list of providers with
//! health gating, per-provider retries, fallback and attempt tracing.
//!
//! The building blocks live in [`broadcastio_core`] (message, result and
//! trace model) and [`broadcastio_delivery`] (orchestrator and providers).
//! This crate adds layered configuration and the command-line front end.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;

pub use broadcastio_core::{
    Attachment, BroadcastioError, DeliveryAttempt, DeliveryError, DeliveryHooks, DeliveryResult,
    DeliveryTrace, ErrorCode, Message, MessageMetadata, ProviderHealth,
};
pub use broadcastio_delivery::{
    BackoffStrategy, DummyProvider, Orchestrator, Provider, ProviderError, RetryPolicy,
    WhatsAppConfig, WhatsAppProvider,
};
pub use config::Config;
