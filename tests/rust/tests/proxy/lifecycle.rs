//! Discovery, lifecycle, log and audit endpoints

use std::time::Duration;

use axum::http::StatusCode;
use mcp_compose_core::{
    ActivityBus, ActivityBusConfig, ActivityEvent, ActivityPublisher, ActivityStore, WorkloadStatus,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::db::TestStore;
use tests::fixtures::manifest;
use tests::http::{get, post_json};
use tests::MockRuntime;

use super::ProxyHarness;

const STACK: &str = r#"
[servers.web]
image = "example/web:1"
protocol = "http"
http_port = 8080

[servers.files]
image = "example/files:1"
command = "node server.js"

[servers.remote]
url = "https://mcp.example.com/mcp"
protocol = "http"
"#;

#[tokio::test]
async fn test_discovery_lists_live_and_remote_servers() {
    let harness = ProxyHarness::new(manifest(STACK), MockRuntime::new().with_running("web"));
    let response = get(harness.router(), "/api/servers", None).await;

    assert_eq!(response.status, StatusCode::OK);
    let servers = response.json();
    assert_eq!(
        servers["web"],
        json!({
            "name": "web",
            "container": "mcp-compose-web",
            "status": "running",
            "protocol": "http",
            "url": "http://mcp-compose-web:8080/",
            "httpPort": 8080,
        })
    );
    assert_eq!(servers["remote"]["status"], "remote");
    assert_eq!(servers["remote"]["url"], "https://mcp.example.com/mcp");
    assert!(servers.get("files").is_none(), "stopped servers are not discovered");
}

#[tokio::test]
async fn test_discovery_skips_servers_that_cannot_be_routed() {
    let runtime = MockRuntime::new()
        .with_status("web", WorkloadStatus::Paused)
        .with_status("files", WorkloadStatus::Starting);
    let harness = ProxyHarness::new(manifest(STACK), runtime);

    let servers = get(harness.router(), "/api/servers", None).await.json();
    assert!(servers.get("web").is_none());
    assert!(servers.get("files").is_none());
    assert_eq!(servers["remote"]["status"], "remote");

    let routed = post_json(harness.router(), "/web", None, &json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" })).await;
    assert_eq!(routed.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_counts_running_servers() {
    let harness = ProxyHarness::new(manifest(STACK), MockRuntime::new().with_running("web"));
    let status = get(harness.router(), "/api/status", None).await.json();

    assert_eq!(status["status"], "running");
    assert_eq!(status["serverCount"], 2);
    assert_eq!(status["runningServers"], 1);
}

#[tokio::test]
async fn test_start_and_stop_actions() {
    let harness = ProxyHarness::new(manifest(STACK), MockRuntime::new());
    let router = harness.router();

    let started = post_json(router.clone(), "/api/servers/start", None, &json!({ "server": "files" })).await;
    assert_eq!(started.status, StatusCode::OK);
    assert_eq!(started.json(), json!({ "status": "ok", "action": "start", "server": "files" }));
    assert!(harness.runtime.is_running("mcp-compose-files"));

    let stopped = post_json(router, "/api/servers/stop", None, &json!({ "server": "files" })).await;
    assert_eq!(stopped.status, StatusCode::OK);
    assert!(!harness.runtime.is_running("mcp-compose-files"));
}

#[tokio::test]
async fn test_unknown_action_is_bad_request() {
    let harness = ProxyHarness::new(manifest(STACK), MockRuntime::new());
    let response = post_json(harness.router(), "/api/servers/pause", None, &json!({ "server": "web" })).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_action_on_unknown_server_is_not_found() {
    let harness = ProxyHarness::new(manifest(STACK), MockRuntime::new());
    let response = post_json(harness.router(), "/api/servers/restart", None, &json!({ "server": "ghost" })).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(harness.runtime.calls_of("start ").is_empty());
}

#[tokio::test]
async fn test_reload_starts_missing_servers() {
    let harness = ProxyHarness::new(manifest(STACK), MockRuntime::new().with_running("web"));
    let response = post_json(harness.router(), "/api/reload", None, &json!({})).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["status"], "reloaded");
    assert_eq!(body["summary"]["started"], json!(["files"]));
    assert!(harness.runtime.is_running("mcp-compose-files"));
}

#[tokio::test]
async fn test_container_logs_as_json() {
    let runtime = MockRuntime::new().with_running("web").with_logs(
        "mcp-compose-web",
        ["INFO listening on :8080", "ERROR upstream refused"],
    );
    let harness = ProxyHarness::new(manifest(STACK), runtime);
    let response = get(harness.router(), "/api/containers/web/logs?tail=10", None).await;

    assert_eq!(response.status, StatusCode::OK);
    let lines = response.json();
    assert_eq!(lines.as_array().unwrap().len(), 2);
    assert_eq!(lines[0]["server"], "web");
    assert_eq!(lines[0]["level"], "INFO");
    assert_eq!(lines[1]["level"], "ERROR");
    assert_eq!(lines[1]["message"], "ERROR upstream refused");
}

#[tokio::test]
async fn test_logs_for_missing_container_are_not_found() {
    let harness = ProxyHarness::new(manifest(STACK), MockRuntime::new());
    let response = get(harness.router(), "/api/containers/mcp-compose-web/logs", None).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_container_stats() {
    let harness = ProxyHarness::new(manifest(STACK), MockRuntime::new().with_running("web"));
    let router = harness.router();

    let stats = get(router.clone(), "/api/containers/web/stats", None).await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.json()["name"], "mcp-compose-web");

    let missing = get(router, "/api/containers/files/stats", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_audit_without_store_is_unavailable() {
    let harness = ProxyHarness::new(manifest(STACK), MockRuntime::new());
    let response = get(harness.router(), "/api/audit/activity", None).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_audit_reads_persisted_activity() {
    let store = TestStore::in_memory();
    store
        .store
        .insert(&ActivityEvent::info("system", "Proxy started"))
        .await
        .unwrap();
    store
        .store
        .insert(&ActivityEvent::error("error", "tools/call → web failed").with_server("web"))
        .await
        .unwrap();

    let harness = ProxyHarness::build(
        manifest(STACK),
        MockRuntime::new(),
        ActivityPublisher::Disabled,
        Some(store.dyn_store()),
        |_| {},
    );
    let router = harness.router();

    let activity = get(router.clone(), "/api/audit/activity?limit=1", None).await.json();
    assert_eq!(activity["count"], 1);
    assert_eq!(activity["events"][0]["message"], "tools/call → web failed");

    let stats = get(router, "/api/audit/stats", None).await.json();
    assert_eq!(stats["stats"]["total"], 2);
    assert_eq!(stats["stats"]["by_severity"]["ERROR"], 1);
}

#[tokio::test]
async fn test_lifecycle_actions_are_published() {
    let bus = ActivityBus::start(ActivityBusConfig::default(), None);
    let (sink, mut rx) = tests::events::RecordingSink::new();
    let _subscription = bus.subscribe(Box::new(sink));

    let harness = ProxyHarness::build(
        manifest(STACK),
        MockRuntime::new(),
        ActivityPublisher::Local(bus.clone()),
        None,
        |_| {},
    );
    post_json(harness.router(), "/api/servers/start", None, &json!({ "server": "web" })).await;

    let event = tests::events::wait_for_event(&mut rx, Duration::from_secs(2), |e| {
        e.kind == mcp_compose_core::kinds::SERVICE
    })
    .await
    .expect("service event");
    assert_eq!(event.server.as_deref(), Some("web"));
    assert_eq!(event.details.unwrap()["action"], "start");
    bus.shutdown().await;
}
