//! Multi-provider message delivery.
//!
//! An [`Orchestrator`] owns an ordered list of [`Provider`]s and delivers a
//! [`Message`](broadcastio_core::Message) through the first one that
//! succeeds.
//!
//! # Delivery lifecycle
//!
//! 1. **Validate** - reject malformed messages before touching a provider
//! 2. **Health Check** - probe providers, served from a TTL cache
//! 3. **Retry** - try each provider under its retry policy and backoff
//! 4. **Fallback** - move to the next provider on exhaustion
//! 5. **Report** - return a result, optionally with a full attempt trace
//!
//! # Example
//!
//! ```no_run
//! use broadcastio_core::Message;
//! use broadcastio_delivery::{DummyProvider, Orchestrator, WhatsAppConfig, WhatsAppProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let orchestrator = Orchestrator::builder()
//!     .provider(WhatsAppProvider::new(WhatsAppConfig::new("http://localhost:3000"))?)
//!     .provider(DummyProvider::new())
//!     .build()?;
//!
//! let result = orchestrator.send(&Message::new("ops-team", "disk almost full"), true).await?;
//! println!("delivered via {}", result.provider);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::time::Duration;

pub mod error;
pub mod health;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod retry;
mod validate;

pub use error::ProviderError;
pub use health::HealthCache;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use provider::Provider;
pub use providers::{DummyProvider, WhatsAppConfig, WhatsAppProvider};
pub use retry::{BackoffStrategy, RetryPolicy, RetryPolicyBuilder};
pub use validate::validate_message;

/// Default lifetime of a cached health snapshot.
pub const DEFAULT_HEALTH_TTL: Duration = Duration::from_secs(30);
