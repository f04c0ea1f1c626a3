//! Message model and provider health snapshots.
//!
//! A [`Message`] is built by the caller and consumed read-only by the
//! orchestrator and providers. [`ProviderHealth`] is produced fresh by a
//! provider's health probe and cached by the orchestrator.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{BroadcastioError, Result};

/// File attached to a message.
///
/// The same file is known under two paths: where this process can see it
/// (`host_path`) and where the provider runtime reads it from
/// (`provider_path`), e.g. a volume mounted into a gateway container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Path of the file on the host running the orchestrator.
    pub host_path: PathBuf,

    /// Path of the same file as seen by the provider runtime.
    pub provider_path: String,

    /// Display filename sent along with the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// MIME type hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Attachment {
    /// Creates an attachment from its host and provider paths.
    pub fn new(host_path: impl Into<PathBuf>, provider_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            provider_path: provider_path.into(),
            filename: None,
            mime_type: None,
        }
    }

    /// Sets the display filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the MIME type hint.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Filename to present to the recipient: the explicit one, else the last
    /// component of the host path.
    pub fn display_name(&self) -> Option<String> {
        self.filename.clone().or_else(|| {
            self.host_path.file_name().map(|name| name.to_string_lossy().into_owned())
        })
    }

    /// Host path as a [`Path`].
    pub fn host_path(&self) -> &Path {
        &self.host_path
    }
}

/// Metadata carried alongside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Importance from 1 (lowest) to 10 (highest).
    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Identifier used to correlate logs and traces across systems.
    #[serde(default = "default_reference_id")]
    pub reference_id: String,

    /// Free-form labels such as `alert` or `prod`.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Anything else a provider might need.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

fn default_priority() -> u8 {
    MessageMetadata::DEFAULT_PRIORITY
}

fn default_reference_id() -> String {
    Uuid::new_v4().to_string()
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            reference_id: default_reference_id(),
            tags: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl MessageMetadata {
    /// Priority used when none is given.
    pub const DEFAULT_PRIORITY: u8 = 5;

    /// Lowest accepted priority.
    pub const MIN_PRIORITY: u8 = 1;

    /// Highest accepted priority.
    pub const MAX_PRIORITY: u8 = 10;

    /// Builds metadata from a loose JSON object.
    ///
    /// `priority`, `reference_id` and `tags` are lifted into their fields;
    /// every other key lands in `extra`. `null` yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `value` is neither an object nor
    /// `null`, or when one of the lifted keys has the wrong type.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(BroadcastioError::validation(format!(
                    "metadata must be an object or null, got {other}"
                )))
            },
        };

        let mut metadata = Self::default();

        if let Some(priority) = object.remove("priority") {
            let priority = priority
                .as_u64()
                .ok_or_else(|| BroadcastioError::validation("metadata priority must be an integer"))?;
            metadata.priority = u8::try_from(priority).unwrap_or(u8::MAX);
        }

        if let Some(reference_id) = object.remove("reference_id") {
            metadata.reference_id = reference_id
                .as_str()
                .ok_or_else(|| BroadcastioError::validation("metadata reference_id must be a string"))?
                .to_string();
        }

        if let Some(tags) = object.remove("tags") {
            metadata.tags = serde_json::from_value(tags)
                .map_err(|e| BroadcastioError::validation(format!("metadata tags: {e}")))?;
        }

        metadata.extra = object;
        Ok(metadata)
    }

    /// Sets the priority. Range is checked when the message is validated.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the reference id.
    #[must_use]
    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = reference_id.into();
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Adds an extra key/value pair.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Whether the priority lies within 1..=10.
    pub fn has_valid_priority(&self) -> bool {
        (Self::MIN_PRIORITY..=Self::MAX_PRIORITY).contains(&self.priority)
    }
}

/// Outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Provider-specific recipient identifier, e.g. a phone number.
    pub recipient: String,

    /// Text body. May be empty when an attachment is present.
    #[serde(default)]
    pub content: String,

    /// Correlation and routing metadata.
    #[serde(default)]
    pub metadata: MessageMetadata,

    /// Optional file to send.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl Message {
    /// Creates a text message with default metadata.
    pub fn new(recipient: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            content: content.into(),
            metadata: MessageMetadata::default(),
            attachment: None,
        }
    }

    /// Attaches a file.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Reference id used for tracing.
    pub fn reference_id(&self) -> &str {
        &self.metadata.reference_id
    }

    /// Whether the message carries a non-empty text body.
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Readiness reported by a provider's health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Name of the provider that was probed.
    pub provider: String,

    /// Whether the provider can accept messages right now.
    pub ready: bool,

    /// When the probe ran.
    pub checked_at: DateTime<Utc>,

    /// Human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ProviderHealth {
    /// Healthy snapshot.
    pub fn ready(provider: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self { provider: provider.into(), ready: true, checked_at, details: None }
    }

    /// Unhealthy snapshot with an explanation.
    pub fn unavailable(
        provider: impl Into<String>,
        checked_at: DateTime<Utc>,
        details: impl Into<String>,
    ) -> Self {
        Self { provider: provider.into(), ready: false, checked_at, details: Some(details.into()) }
    }

    /// Sets the details text.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
