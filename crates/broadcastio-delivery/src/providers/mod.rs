//! Built-in providers.

mod dummy;
mod whatsapp;

pub use dummy::DummyProvider;
pub use whatsapp::{WhatsAppConfig, WhatsAppProvider};
