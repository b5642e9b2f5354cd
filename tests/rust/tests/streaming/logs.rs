//! Log tails: proxy SSE endpoint, client-side feed and the socket pump

use std::convert::Infallible;
use std::sync::Arc;

use axum::http::StatusCode;
use futures::StreamExt;
use mcp_compose_core::{ActivityPublisher, ComposeControl, LogLevel};
use mcp_compose_gateway::streaming::logs::{pump_logs, runtime_feed, LogFeedItem, LogStreamEnd};
use mcp_compose_gateway::streaming::sse::sse_log_feed;
use mcp_compose_gateway::{ProxyConfig, ProxyServer, ProxyState};
use mcp_compose_orchestrator::Compose;
use mcp_compose_runtime::{ContainerRuntime, LogOptions};
use pretty_assertions::assert_eq;
use tests::fixtures::manifest;
use tests::http::get;
use tests::MockRuntime;
use tokio_util::sync::CancellationToken;

use super::{channel_writer, drain_json};

const LINES: [&str; 3] = [
    "server listening on :8080",
    "WARN slow upstream",
    "ERROR connection refused",
];

fn proxy(runtime: MockRuntime) -> axum::Router {
    let manifest = manifest(
        r#"
        [servers.web]
        image = "ghcr.io/acme/web:1"
        protocol = "http"
        http_port = 8080
        "#,
    );
    let runtime = Arc::new(runtime);
    let config = ProxyConfig::from_section(&manifest.proxy);
    let control: Arc<dyn ComposeControl> = Arc::new(Compose::new(
        runtime.clone(),
        ActivityPublisher::Disabled,
        manifest,
    ));
    let state = ProxyState::new(config, runtime, control, ActivityPublisher::Disabled, None)
        .expect("proxy state");
    ProxyServer::new(state).build_router()
}

/// Replay an SSE body through the client-side parser.
async fn feed_items(body: Vec<u8>) -> Vec<LogFeedItem> {
    // split mid-frame to exercise buffering
    let middle = body.len() / 2;
    let chunks = vec![
        Ok::<_, Infallible>(body[..middle].to_vec()),
        Ok(body[middle..].to_vec()),
    ];
    sse_log_feed(futures::stream::iter(chunks), "web".to_string())
        .collect()
        .await
}

#[tokio::test]
async fn test_follow_serves_framed_events() {
    let router = proxy(MockRuntime::new().with_logs("mcp-compose-web", LINES));

    let response = get(router, "/api/containers/web/logs?follow=true", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response
        .header("content-type")
        .unwrap()
        .starts_with("text/event-stream"));
    let body = response.text();
    let connected = body.find("event: connected").expect("connected frame");
    let first_log = body.find("event: log").expect("log frame");
    let completed = body.find("event: completed").expect("completed frame");
    assert!(connected < first_log && first_log < completed);
    assert_eq!(body.matches("event: log").count(), 3);
}

#[tokio::test]
async fn test_sse_body_becomes_log_feed() {
    let router = proxy(MockRuntime::new().with_logs("mcp-compose-web", LINES));
    let response = get(router, "/api/containers/web/logs?follow=true", None).await;

    let items = feed_items(response.body).await;

    assert_eq!(items.len(), 4);
    let levels: Vec<LogLevel> = items
        .iter()
        .filter_map(|item| match item {
            LogFeedItem::Line(line) => Some(line.level),
            LogFeedItem::Ended(_) => None,
        })
        .collect();
    assert_eq!(levels, vec![LogLevel::Info, LogLevel::Warn, LogLevel::Error]);
    match &items[0] {
        LogFeedItem::Line(line) => {
            assert_eq!(line.server, "web");
            assert_eq!(line.message, "server listening on :8080");
        }
        other => panic!("expected a line, got {other:?}"),
    }
    assert_eq!(items[3], LogFeedItem::Ended("container stopped".to_string()));
}

#[tokio::test]
async fn test_unknown_container_sends_error_frame() {
    let router = proxy(MockRuntime::new());
    let response = get(router, "/api/containers/ghost/logs?follow=true", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text().contains("event: error"));

    let items = feed_items(response.body).await;
    assert_eq!(items.len(), 1);
    match &items[0] {
        LogFeedItem::Ended(reason) => assert!(reason.contains("mcp-compose-ghost"), "{reason}"),
        other => panic!("expected end of feed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_pump_writes_lines_then_final_error_frame() {
    let runtime = MockRuntime::new().with_logs("mcp-compose-web", LINES);
    let stream = runtime
        .logs("mcp-compose-web", &LogOptions::default())
        .await
        .unwrap();
    let (writer, mut rx) = channel_writer();
    let cancel = CancellationToken::new();

    let end = pump_logs(runtime_feed(stream, "web".to_string()), &writer, &cancel).await;

    assert_eq!(end, LogStreamEnd::Ended("container stopped".to_string()));
    let frames = drain_json(&mut rx);
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0]["server"], "web");
    assert_eq!(frames[2]["level"], "ERROR");
    assert_eq!(frames[3]["error"], "log stream ended: container stopped");
}

#[tokio::test]
async fn test_pump_stops_when_client_is_gone() {
    let runtime = MockRuntime::new().with_logs("mcp-compose-web", LINES);
    let stream = runtime
        .logs("mcp-compose-web", &LogOptions::default())
        .await
        .unwrap();
    let (writer, rx) = channel_writer();
    drop(rx);
    let cancel = CancellationToken::new();

    let end = pump_logs(runtime_feed(stream, "web".to_string()), &writer, &cancel).await;

    assert_eq!(end, LogStreamEnd::WriteFailed);
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_pump_honours_cancellation() {
    let (writer, mut rx) = channel_writer();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let end = pump_logs(futures::stream::pending().boxed(), &writer, &cancel).await;

    assert_eq!(end, LogStreamEnd::Cancelled);
    assert!(drain_json(&mut rx).is_empty());
}
