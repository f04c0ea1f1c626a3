//! Message validation run before any provider is contacted.

use broadcastio_core::{Attachment, BroadcastioError, Message, MessageMetadata, Result};
use tracing::warn;

/// Checks a message and its attachment.
///
/// # Errors
///
/// - `Validation` for a blank recipient, missing content and attachment, or
///   an out-of-range priority
/// - `Attachment` when the host file is missing or the provider path is
///   unusable
pub async fn validate_message(message: &Message) -> Result<()> {
    if message.recipient.trim().is_empty() {
        return Err(BroadcastioError::validation("message recipient is required"));
    }

    if looks_like_phone_number(&message.recipient) {
        warn!(
            reference_id = message.reference_id(),
            "recipient looks like a raw phone number; avoid hard-coding real numbers"
        );
    }

    if !message.has_content() && message.attachment.is_none() {
        return Err(BroadcastioError::validation("message must have content or an attachment"));
    }

    if !message.metadata.has_valid_priority() {
        return Err(BroadcastioError::validation(format!(
            "priority must be between {} and {}, got {}",
            MessageMetadata::MIN_PRIORITY,
            MessageMetadata::MAX_PRIORITY,
            message.metadata.priority
        )));
    }

    if let Some(attachment) = &message.attachment {
        validate_attachment(attachment).await?;
    }

    Ok(())
}

async fn validate_attachment(attachment: &Attachment) -> Result<()> {
    let is_file = tokio::fs::metadata(attachment.host_path())
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(BroadcastioError::attachment(format!(
            "attachment not found: {}",
            attachment.host_path().display()
        )));
    }

    validate_provider_path(&attachment.provider_path)
}

fn validate_provider_path(provider_path: &str) -> Result<()> {
    let invalid = || BroadcastioError::attachment(format!("invalid provider_path: {provider_path:?}"));

    if provider_path.trim().is_empty() || provider_path.ends_with('/') {
        return Err(invalid());
    }

    // An absolute path needs a directory below the root.
    if provider_path.starts_with('/') && provider_path.rfind('/') == Some(0) {
        return Err(invalid());
    }

    Ok(())
}

fn looks_like_phone_number(recipient: &str) -> bool {
    let digits = recipient.strip_prefix('+').unwrap_or(recipient);
    digits.len() > 10 && digits.chars().all(|c| c.is_ascii_digit())
}
