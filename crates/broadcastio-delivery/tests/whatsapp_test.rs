//! HTTP contract tests for the WhatsApp gateway provider.

use std::time::Duration;

use anyhow::Result;
use broadcastio_core::{ErrorCode, TestClock};
use broadcastio_delivery::{
    DummyProvider, Orchestrator, Provider, ProviderError, RetryPolicy, WhatsAppConfig,
    WhatsAppProvider,
};
use broadcastio_testing::{fixtures, FORCE_LOGICAL_FAIL};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer) -> WhatsAppProvider {
    WhatsAppProvider::new(WhatsAppConfig::new(server.uri())).unwrap()
}

#[tokio::test]
async fn healthy_gateway_reports_ready() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "provider": "whatsapp",
            "ready": true,
            "timestamp": "2024-05-01T08:30:00.000Z"
        })))
        .mount(&mock_server)
        .await;

    let health = provider_for(&mock_server).health().await;
    assert!(health.ready);
    assert_eq!(health.provider, "whatsapp");
}

#[tokio::test]
async fn gateway_without_session_reports_not_ready() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "provider": "whatsapp",
            "ready": false,
            "timestamp": "2024-05-01T08:30:00.000Z"
        })))
        .mount(&mock_server)
        .await;

    let health = provider_for(&mock_server).health().await;
    assert!(!health.ready);
    assert_eq!(health.details.as_deref(), Some("gateway client not ready"));
}

#[tokio::test]
async fn failing_health_endpoint_reports_not_ready() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let health = provider_for(&mock_server).health().await;
    assert!(!health.ready);
    assert!(health.details.unwrap().contains("503"));
}

#[tokio::test]
async fn unreachable_gateway_reports_not_ready_and_unavailable() {
    let uri = {
        let mock_server = MockServer::builder().start().await;
        mock_server.uri()
    };
    let provider = WhatsAppProvider::new(WhatsAppConfig::new(uri)).unwrap();

    assert!(!provider.health().await.ready);

    let err = provider.send(&fixtures::text_message()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }), "got {err:?}");
}

#[tokio::test]
async fn successful_send_returns_gateway_message_id() -> Result<()> {
    let mock_server = MockServer::start().await;
    let fixture = fixtures::attachment_message("report.pdf")?;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/send"))
        .and(matchers::body_partial_json(json!({
            "recipient": "ops-team",
            "content": "monthly report attached",
            "metadata": { "priority": 5 },
            "attachment": { "path": "/data/report.pdf", "filename": "report.pdf" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "provider": "whatsapp",
            "message_id": "3EB0C767D82B6A3F"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = provider_for(&mock_server).send(&fixture.message).await?;

    assert!(result.success);
    assert_eq!(result.provider, "whatsapp");
    assert_eq!(result.message_id.as_deref(), Some("3EB0C767D82B6A3F"));
    Ok(())
}

#[tokio::test]
async fn rejected_message_keeps_gateway_code() -> Result<()> {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/send"))
        .and(matchers::body_partial_json(json!({
            "metadata": { "reference_id": FORCE_LOGICAL_FAIL }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": { "code": "WHATSAPP_REJECTED", "message": "Forced logical failure for testing" }
        })))
        .mount(&mock_server)
        .await;

    let result = provider_for(&mock_server)
        .send(&fixtures::message_with_reference(FORCE_LOGICAL_FAIL))
        .await?;

    assert!(!result.success);
    let error = result.error.expect("failure carries an error");
    assert_eq!(error.code, ErrorCode::from("WHATSAPP_REJECTED"));
    assert_eq!(error.message, "Forced logical failure for testing");
    Ok(())
}

#[tokio::test]
async fn bad_request_becomes_validation_failure() -> Result<()> {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/send"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "error": { "code": "INVALID_ATTACHMENT", "message": "attachment.path is required" }
        })))
        .mount(&mock_server)
        .await;

    let result = provider_for(&mock_server).send(&fixtures::text_message()).await?;

    let error = result.error.expect("failure carries an error");
    assert_eq!(error.code, ErrorCode::ValidationError);
    assert_eq!(error.message, "attachment.path is required");
    assert_eq!(error.details, Some(json!({"status": 400, "gateway_code": "INVALID_ATTACHMENT"})));
    Ok(())
}

#[tokio::test]
async fn server_error_is_unavailability() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/send"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "error": "WhatsApp client not ready"
        })))
        .mount(&mock_server)
        .await;

    let err = provider_for(&mock_server).send(&fixtures::text_message()).await.unwrap_err();

    assert!(matches!(err, ProviderError::Unavailable { .. }));
    assert!(err.to_string().contains("WhatsApp client not ready"));
}

#[tokio::test]
async fn slow_gateway_times_out_as_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/send"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "message_id": "late"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let config = WhatsAppConfig {
        timeout: Duration::from_millis(200),
        ..WhatsAppConfig::new(mock_server.uri())
    };
    let provider = WhatsAppProvider::new(config).unwrap();

    let err = provider.send(&fixtures::text_message()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }), "got {err:?}");
}

#[tokio::test]
async fn malformed_reply_is_unexpected() {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/send"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>bad gateway</html>"))
        .mount(&mock_server)
        .await;

    let err = provider_for(&mock_server).send(&fixtures::text_message()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Unexpected { .. }));
}

#[tokio::test]
async fn failing_gateway_retried_then_dummy_fallback() -> Result<()> {
    let mock_server = MockServer::start().await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "provider": "whatsapp",
            "ready": true,
            "timestamp": "2024-05-01T08:30:00.000Z"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/send"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&mock_server)
        .await;

    let whatsapp = provider_for(&mock_server).with_retry_policy(RetryPolicy::new(2)?);
    let orchestrator = Orchestrator::builder()
        .provider(whatsapp)
        .provider(DummyProvider::new())
        .clock(TestClock::new())
        .build()?;

    let result = orchestrator.send(&fixtures::text_message(), true).await?;

    assert!(result.success);
    assert_eq!(result.provider, "dummy");
    let trace = result.trace.expect("trace requested");
    assert_eq!(trace.providers(), vec!["whatsapp", "whatsapp", "dummy"]);
    let error = trace.attempts()[0].error.as_ref().expect("failed attempt carries an error");
    assert_eq!(error.code, ErrorCode::ProviderUnavailable);
    assert_eq!(error.message, "whatsapp service unavailable");
    Ok(())
}
