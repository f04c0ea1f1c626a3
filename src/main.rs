//! broadcastio command-line front end.
//!
//! Loads configuration, builds an orchestrator with logging hooks, sends a
//! single message and prints the JSON result on stdout. Logs go to stderr.

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use broadcastio::{Attachment, Config, DeliveryHooks, Message, MessageMetadata};
use clap::Parser;
use tracing::{debug, error, info, warn};

/// Send one message through the configured providers.
#[derive(Debug, Parser)]
#[command(name = "broadcastio", version, about)]
struct Args {
    /// Recipient identifier, e.g. a phone number or chat id.
    recipient: String,

    /// Message text. May be empty when an attachment is given.
    #[arg(default_value = "")]
    content: String,

    /// Embed the full attempt trace in the printed result.
    #[arg(long)]
    trace: bool,

    /// File to attach, as seen from this machine.
    #[arg(long, requires = "provider_path")]
    attachment: Option<PathBuf>,

    /// Path of the attachment as seen by the provider runtime.
    #[arg(long, requires = "attachment")]
    provider_path: Option<String>,

    /// Message priority from 1 to 10.
    #[arg(long, default_value_t = MessageMetadata::DEFAULT_PRIORITY)]
    priority: u8,

    /// Reference id for correlating logs; random when omitted.
    #[arg(long)]
    reference_id: Option<String>,

    /// Tag to attach; repeatable.
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Configuration file.
    #[arg(long, default_value = broadcastio::config::CONFIG_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = Config::load_from(&args.config)?;

    init_tracing(&config.rust_log)?;
    info!(
        whatsapp_url = config.whatsapp_url.as_deref().unwrap_or("disabled"),
        dummy_enabled = config.dummy_enabled,
        health_ttl_seconds = config.health_ttl_seconds,
        require_healthy = config.require_healthy,
        "Configuration loaded"
    );

    let orchestrator = config.to_orchestrator(logging_hooks())?;
    let message = build_message(&args);

    let result = orchestrator
        .send(&message, args.trace)
        .await
        .context("message was rejected before delivery")?;

    let json = serde_json::to_string_pretty(&result).context("failed to serialize result")?;
    println!("{json}");

    Ok(if result.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn build_message(args: &Args) -> Message {
    let mut metadata = MessageMetadata::default().with_priority(args.priority);
    if let Some(reference_id) = &args.reference_id {
        metadata = metadata.with_reference_id(reference_id);
    }
    for tag in &args.tags {
        metadata = metadata.with_tag(tag);
    }

    let mut message = Message::new(&args.recipient, &args.content).with_metadata(metadata);
    if let (Some(host_path), Some(provider_path)) = (&args.attachment, &args.provider_path) {
        message = message.with_attachment(Attachment::new(host_path, provider_path));
    }
    message
}

fn logging_hooks() -> DeliveryHooks {
    DeliveryHooks::new()
        .on_attempt(|attempt| {
            match &attempt.error {
                None => debug!(
                    provider = %attempt.provider,
                    attempt = attempt.attempt,
                    duration_ms = attempt.duration_ms,
                    "Attempt succeeded"
                ),
                Some(error) => warn!(
                    provider = %attempt.provider,
                    attempt = attempt.attempt,
                    code = %error.code,
                    "Attempt failed: {}",
                    error.message
                ),
            }
            Ok(())
        })
        .on_success(|result| {
            info!(provider = %result.provider, message_id = ?result.message_id, "Delivered");
            Ok(())
        })
        .on_failure(|result| {
            if let Some(error) = &result.error {
                error!(code = %error.code, "Delivery failed: {}", error.message);
            }
            Ok(())
        })
}

/// Initializes tracing, preferring `RUST_LOG` over the configured filter.
fn init_tracing(default_filter: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("invalid log filter")?;

    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_requires_provider_path() {
        let err = Args::try_parse_from(["broadcastio", "ops-team", "hi", "--attachment", "a.pdf"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn builds_message_from_arguments() {
        let args = Args::try_parse_from([
            "broadcastio",
            "ops-team",
            "",
            "--attachment",
            "/tmp/report.pdf",
            "--provider-path",
            "/data/report.pdf",
            "--priority",
            "8",
            "--reference-id",
            "nightly-42",
            "--tag",
            "report",
            "--trace",
        ])
        .unwrap();

        let message = build_message(&args);

        assert!(args.trace);
        assert_eq!(message.metadata.priority, 8);
        assert_eq!(message.reference_id(), "nightly-42");
        assert_eq!(message.metadata.tags, vec!["report"]);
        let attachment = message.attachment.unwrap();
        assert_eq!(attachment.provider_path, "/data/report.pdf");
        assert_eq!(attachment.host_path, PathBuf::from("/tmp/report.pdf"));
    }
}
