//! Provider backed by the WhatsApp gateway service.
//!
//! The gateway is a small HTTP service wrapping a WhatsApp Web session. It
//! exposes `GET /health` and `POST /send`. Attachments are read by the
//! gateway itself, so the payload carries the attachment's provider path,
//! never its host path.

use std::time::Duration;

use async_trait::async_trait;
use broadcastio_core::{
    DeliveryError, DeliveryResult, ErrorCode, Message, MessageMetadata, ProviderHealth,
};
use chrono::Utc;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info_span, Instrument};

use crate::{error::ProviderError, provider::Provider, retry::RetryPolicy};

/// Connection settings for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Gateway base URL, e.g. `http://localhost:3000`.
    pub base_url: String,
    /// Timeout applied to every gateway request.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl WhatsAppConfig {
    /// Settings for the gateway at `base_url` with default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: format!("broadcastio/{}", broadcastio_core::VERSION),
        }
    }
}

/// Sends messages through the WhatsApp gateway.
#[derive(Debug, Clone)]
pub struct WhatsAppProvider {
    client: reqwest::Client,
    base_url: String,
    retry_policy: Option<RetryPolicy>,
}

#[derive(Debug, Serialize)]
struct SendPayload<'a> {
    recipient: &'a str,
    content: &'a str,
    metadata: &'a MessageMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<AttachmentPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct AttachmentPayload<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayReply {
    success: bool,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    error: Option<GatewayError>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GatewayError {
    Structured { code: String, message: String },
    Text(String),
}

#[derive(Debug, Deserialize)]
struct GatewayHealth {
    ready: bool,
}

impl WhatsAppProvider {
    /// Provider name.
    pub const NAME: &'static str = "whatsapp";

    /// Creates a provider for the configured gateway.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Misconfigured` if the HTTP client cannot be
    /// built from the given settings.
    pub fn new(config: WhatsAppConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ProviderError::misconfigured(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry_policy: None,
        })
    }

    /// Overrides the orchestrator's retry policy for this provider.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn probe(&self) -> Result<bool, ProviderError> {
        let response = self.client.get(self.url("/health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::unavailable(format!("health endpoint returned {status}")));
        }

        let health: GatewayHealth = response.json().await?;
        Ok(health.ready)
    }

    fn interpret(status: StatusCode, body: &str) -> Result<DeliveryResult, ProviderError> {
        if status.is_server_error() {
            let reason = gateway_message(body).unwrap_or_else(|| body.trim().to_string());
            if reason.is_empty() {
                return Err(ProviderError::unavailable(format!("gateway returned {status}")));
            }
            return Err(ProviderError::unavailable(format!("gateway returned {status}: {reason}")));
        }

        if status.is_client_error() {
            let message = gateway_message(body).unwrap_or_else(|| format!("gateway returned {status}"));
            let mut details = json!({ "status": status.as_u16() });
            if let Ok(GatewayReply { error: Some(GatewayError::Structured { code, .. }), .. }) =
                serde_json::from_str::<GatewayReply>(body)
            {
                details["gateway_code"] = json!(code);
            }
            return Ok(DeliveryResult::failed(
                Self::NAME,
                DeliveryError::new(ErrorCode::ValidationError, message).with_details(details),
            ));
        }

        let reply: GatewayReply = serde_json::from_str(body)
            .map_err(|e| ProviderError::unexpected(format!("malformed gateway response: {e}")))?;

        if reply.success {
            return Ok(DeliveryResult::succeeded(Self::NAME, reply.message_id));
        }

        let error = match reply.error {
            Some(GatewayError::Structured { code, message }) => DeliveryError::new(code, message),
            Some(GatewayError::Text(message)) => {
                DeliveryError::new(ErrorCode::AllProvidersFailed, message)
            },
            None => DeliveryError::new(
                ErrorCode::AllProvidersFailed,
                "gateway reported failure without an error",
            ),
        };
        Ok(DeliveryResult::failed(Self::NAME, error))
    }
}

fn gateway_message(body: &str) -> Option<String> {
    match serde_json::from_str::<GatewayReply>(body).ok()?.error? {
        GatewayError::Structured { message, .. } | GatewayError::Text(message) => Some(message),
    }
}

#[async_trait]
impl Provider for WhatsAppProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn health(&self) -> ProviderHealth {
        let span = info_span!("whatsapp_health", url = %self.base_url);

        async move {
            match self.probe().await {
                Ok(true) => ProviderHealth::ready(Self::NAME, Utc::now()),
                Ok(false) => {
                    ProviderHealth::unavailable(Self::NAME, Utc::now(), "gateway client not ready")
                },
                Err(e) => {
                    tracing::debug!(error = %e, "health probe failed");
                    ProviderHealth::unavailable(Self::NAME, Utc::now(), e.to_string())
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn send(&self, message: &Message) -> Result<DeliveryResult, ProviderError> {
        let span = info_span!(
            "whatsapp_send",
            reference_id = message.reference_id(),
            url = %self.base_url,
            has_attachment = message.attachment.is_some()
        );

        async move {
            let payload = SendPayload {
                recipient: &message.recipient,
                content: &message.content,
                metadata: &message.metadata,
                attachment: message.attachment.as_ref().map(|attachment| AttachmentPayload {
                    path: &attachment.provider_path,
                    filename: attachment.display_name(),
                }),
            };

            let response = match self.client.post(self.url("/send")).json(&payload).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("request to gateway failed: {}", e);
                    return Err(e.into());
                },
            };

            let status = response.status();
            let body = response.text().await?;
            tracing::debug!(status = status.as_u16(), "received gateway response");

            Self::interpret(status, &body)
        }
        .instrument(span)
        .await
    }

    fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_failure_keeps_gateway_code() {
        let result = WhatsAppProvider::interpret(
            StatusCode::OK,
            r#"{"success": false, "error": {"code": "WHATSAPP_REJECTED", "message": "Forced logical failure for testing"}}"#,
        )
        .unwrap();

        assert!(!result.success);
        assert_eq!(result.error_code(), Some(&ErrorCode::from("WHATSAPP_REJECTED")));
    }

    #[test]
    fn bad_request_becomes_validation_failure() {
        let result = WhatsAppProvider::interpret(
            StatusCode::BAD_REQUEST,
            r#"{"success": false, "error": "recipient and content are required"}"#,
        )
        .unwrap();

        let error = result.error.unwrap();
        assert_eq!(error.code, ErrorCode::ValidationError);
        assert_eq!(error.message, "recipient and content are required");
        assert_eq!(error.details.unwrap()["status"], 400);
    }

    #[test]
    fn server_error_is_unavailability() {
        let err = WhatsAppProvider::interpret(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"success": false, "error": "WhatsApp client not ready"}"#,
        )
        .unwrap_err();

        assert_eq!(
            err,
            ProviderError::unavailable(
                "gateway returned 500 Internal Server Error: WhatsApp client not ready"
            )
        );
    }

    #[test]
    fn unparsable_success_body_is_unexpected() {
        let err = WhatsAppProvider::interpret(StatusCode::OK, "<html>proxy</html>").unwrap_err();
        assert!(matches!(err, ProviderError::Unexpected { .. }));
    }

    #[test]
    fn trailing_slash_trimmed_from_base_url() {
        let provider = WhatsAppProvider::new(WhatsAppConfig::new("http://gateway:3000/")).unwrap();
        assert_eq!(provider.url("/send"), "http://gateway:3000/send");
    }
}
