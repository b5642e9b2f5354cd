//! Cross-process publishing into a dashboard intake

use std::time::Duration;

use mcp_compose_core::{kinds, ActivityEvent, ActivityPublisher, WebhookPublisher};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn intake(status: u16) -> MockServer {
    let dashboard = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/activity"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "status": "accepted" })))
        .mount(&dashboard)
        .await;
    dashboard
}

#[tokio::test]
async fn test_post_sends_event_with_bearer() {
    let dashboard = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/activity"))
        .and(header("authorization", "Bearer activity-key"))
        .and(body_partial_json(json!({
            "kind": "tool",
            "severity": "WARN",
            "server": "github",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&dashboard)
        .await;

    let webhook = WebhookPublisher::new(
        format!("{}/api/activity", dashboard.uri()),
        Some("activity-key".to_string()),
    )
    .unwrap();
    let event = ActivityEvent::warn(kinds::TOOL, "slow tool").with_server("github");

    webhook.post(&event).await.unwrap();
    dashboard.verify().await;
}

#[tokio::test]
async fn test_post_surfaces_error_status() {
    let dashboard = intake(503).await;
    let webhook = WebhookPublisher::new(format!("{}/api/activity", dashboard.uri()), None).unwrap();

    let result = webhook.post(&ActivityEvent::info(kinds::SYSTEM, "hello")).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_remote_publisher_is_fire_and_forget() {
    let dashboard = intake(202).await;
    let webhook = WebhookPublisher::new(format!("{}/api/activity", dashboard.uri()), None).unwrap();
    let publisher = ActivityPublisher::Remote(webhook);
    assert!(publisher.bus().is_none());

    publisher.publish(ActivityEvent::info(kinds::REQUEST, "tools/list → github"));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    let mut received = Vec::new();
    while tokio::time::Instant::now() < deadline {
        received = dashboard.received_requests().await.unwrap_or_default();
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["message"], "tools/list → github");
    assert_eq!(body["kind"], "request");
}
