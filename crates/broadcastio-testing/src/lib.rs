//! Test infrastructure for broadcastio.
//!
//! Provides scripted providers whose behavior is fixed up front, message
//! fixtures, and invariant checks over delivery traces.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod fixtures;
pub mod invariants;
pub mod providers;

pub use broadcastio_core::{Clock, TestClock};
pub use fixtures::{attachment_message, message_with_reference, text_message, AttachmentFixture};
pub use invariants::Invariants;
pub use providers::{LogicalFailProvider, ScriptedProvider, Step, FORCE_LOGICAL_FAIL};
