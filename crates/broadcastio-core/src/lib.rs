//! Core domain types for multi-provider message delivery.
//!
//! Provides the message model, provider health snapshots, delivery results,
//! attempt traces, the error taxonomy, observer hooks and the clock
//! abstraction. The orchestration engine and every provider build on these
//! types so that results and traces look the same no matter which backend
//! produced them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod hooks;
pub mod models;
pub mod result;
pub mod time;
pub mod trace;

pub use error::{BroadcastioError, ErrorCode, Result};
pub use hooks::{AttemptHook, DeliveryHooks, ResultHook};
pub use models::{Attachment, Message, MessageMetadata, ProviderHealth};
pub use result::{DeliveryError, DeliveryResult};
pub use time::{Clock, RealClock, TestClock};
pub use trace::{DeliveryAttempt, DeliveryTrace};

/// Version of the broadcastio crates.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn version_is_set() {
        assert!(!super::VERSION.is_empty());
        assert_ne!(super::VERSION, "unknown");
    }
}
