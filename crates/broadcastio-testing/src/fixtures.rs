//! Message fixtures.

use std::io::Write;

use anyhow::{Context, Result};
use broadcastio_core::{Attachment, Message, MessageMetadata};
use tempfile::TempDir;

/// Plain text message to a non-phone recipient.
pub fn text_message() -> Message {
    Message::new("ops-team", "disk usage above 90% on db-1")
        .with_metadata(MessageMetadata::default().with_tag("alert"))
}

/// Text message with a fixed reference id.
pub fn message_with_reference(reference_id: &str) -> Message {
    Message::new("ops-team", "nightly report ready")
        .with_metadata(MessageMetadata::default().with_reference_id(reference_id))
}

/// A message whose attachment exists on disk for as long as the fixture
/// lives.
#[derive(Debug)]
pub struct AttachmentFixture {
    /// Directory holding the attachment file.
    pub dir: TempDir,
    /// Message referencing the file.
    pub message: Message,
}

/// Creates a message with a small PDF attachment in a temporary directory.
///
/// The provider path points at `/data/<filename>`, as a gateway container
/// with the directory mounted at `/data` would see it.
pub fn attachment_message(filename: &str) -> Result<AttachmentFixture> {
    let dir = tempfile::tempdir().context("failed to create attachment directory")?;
    let host_path = dir.path().join(filename);

    let mut file = std::fs::File::create(&host_path)
        .with_context(|| format!("failed to create {}", host_path.display()))?;
    file.write_all(b"%PDF-1.4\n%broadcastio test attachment\n")
        .context("failed to write attachment")?;

    let attachment = Attachment::new(&host_path, format!("/data/{filename}"))
        .with_mime_type("application/pdf");
    let message = Message::new("ops-team", "monthly report attached").with_attachment(attachment);

    Ok(AttachmentFixture { dir, message })
}
