//! JSON-RPC forwarding to HTTP and stdio upstreams

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use mcp_compose_core::{kinds, ActivityBus, ActivityBusConfig, ActivityPublisher};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::events::{wait_for_event, RecordingSink};
use tests::fixtures::{manifest, remote_server_manifest, rpc, rpc_result};
use tests::http::{get, post_json, send};
use tests::MockRuntime;
use wiremock::matchers::{body_partial_json, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::ProxyHarness;

async fn echo_upstream() -> MockServer {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({ "method": "tools/list" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(rpc_result(json!(1), json!({ "tools": [{ "name": "search" }] }))),
        )
        .mount(&upstream)
        .await;
    upstream
}

#[tokio::test]
async fn test_forward_to_remote_url() {
    let upstream = echo_upstream().await;
    let harness = ProxyHarness::new(
        remote_server_manifest("remote", &format!("{}/mcp", upstream.uri()), None),
        MockRuntime::new(),
    );

    let response = post_json(harness.router(), "/remote", None, &rpc("tools/list", 1)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["result"]["tools"][0]["name"], "search");
}

#[tokio::test]
async fn test_missing_params_are_sent_as_empty_object() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "ping", "params": {} })))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(json!(7), json!({}))))
        .expect(1)
        .mount(&upstream)
        .await;
    let harness = ProxyHarness::new(
        remote_server_manifest("remote", &upstream.uri(), None),
        MockRuntime::new(),
    );

    let payload = json!({ "jsonrpc": "2.0", "id": 7, "method": "ping" });
    let response = post_json(harness.router(), "/remote", None, &payload).await;

    assert_eq!(response.status, StatusCode::OK);
    upstream.verify().await;
}

#[tokio::test]
async fn test_mcp_session_header_round_trips() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header_matcher("mcp-session-id", "sess-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("mcp-session-id", "sess-1")
                .set_body_json(rpc_result(json!(1), json!({}))),
        )
        .expect(1)
        .mount(&upstream)
        .await;
    let harness = ProxyHarness::new(
        remote_server_manifest("remote", &upstream.uri(), None),
        MockRuntime::new(),
    );

    let request = Request::post("/remote")
        .header(header::CONTENT_TYPE, "application/json")
        .header("mcp-session-id", "sess-1")
        .body(Body::from(rpc("tools/list", 1).to_string()))
        .unwrap();
    let response = send(harness.router(), request).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("mcp-session-id"), Some("sess-1"));
    upstream.verify().await;
}

#[tokio::test]
async fn test_container_server_through_published_port() {
    let upstream = echo_upstream().await;
    let port = upstream.address().port();
    let harness = ProxyHarness::new(
        manifest(&format!(
            r#"
            [servers.search]
            image = "example/search:1"
            protocol = "http"
            http_port = 8080
            http_path = "/mcp"
            ports = ["{port}:8080"]

            [proxy]
            upstream_host = "127.0.0.1"
            "#
        )),
        MockRuntime::new().with_running("search"),
    );

    let response = post_json(harness.router(), "/search", None, &rpc("tools/list", 1)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["result"]["tools"][0]["name"], "search");
}

#[tokio::test]
async fn test_unknown_server_is_not_found() {
    let harness = ProxyHarness::new(manifest(""), MockRuntime::new());
    let response = post_json(harness.router(), "/nope", None, &rpc("tools/list", 1)).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error"], "Unknown server 'nope'");
}

#[tokio::test]
async fn test_stopped_container_server_is_not_found() {
    let harness = ProxyHarness::new(
        manifest(
            r#"
            [servers.files]
            image = "example/files:1"
            command = "node server.js"
            "#,
        ),
        MockRuntime::new(),
    );
    let response = post_json(harness.router(), "/files", None, &rpc("tools/list", 1)).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.json()["error"]
        .as_str()
        .unwrap()
        .contains("is not running"));
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let harness = ProxyHarness::new(
        remote_server_manifest("remote", "http://127.0.0.1:9/mcp", None),
        MockRuntime::new(),
    );
    let request = Request::post("/remote")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(harness.router(), request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Port 9 (discard) is not listening on test hosts
    let harness = ProxyHarness::new(
        remote_server_manifest("remote", "http://127.0.0.1:9/mcp", None),
        MockRuntime::new(),
    );
    let response = post_json(harness.router(), "/remote", None, &rpc("tools/list", 1)).await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(rpc_result(json!(1), json!({}))),
        )
        .mount(&upstream)
        .await;
    let harness = ProxyHarness::build(
        remote_server_manifest("remote", &upstream.uri(), None),
        MockRuntime::new(),
        ActivityPublisher::Disabled,
        None,
        |config| config.upstream_timeout = Duration::from_millis(200),
    );

    let response = post_json(harness.router(), "/remote", None, &rpc("tools/list", 1)).await;

    assert_eq!(response.status, StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_upstream_error_status_passes_through_and_counts() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&upstream)
        .await;
    let harness = ProxyHarness::new(
        remote_server_manifest("remote", &upstream.uri(), None),
        MockRuntime::new(),
    );
    let router = harness.router();

    let request = Request::post("/remote")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-client-id", "agent-7")
        .body(Body::from(rpc("tools/list", 1).to_string()))
        .unwrap();
    let response = send(router.clone(), request).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "boom");

    let connections = get(router, "/api/connections", None).await.json();
    assert_eq!(connections["totalRequests"], 1);
    assert_eq!(connections["totalErrors"], 1);
    assert_eq!(connections["servers"]["remote"]["clients"], json!(["agent-7"]));
}

#[tokio::test]
async fn test_stdio_server_through_exec_bridge() {
    let harness = ProxyHarness::new(
        manifest(
            r#"
            [servers.files]
            image = "example/files:1"
            command = "node server.js --stdio"
            "#,
        ),
        MockRuntime::new().with_running("files"),
    );
    let router = harness.router();

    let first = post_json(router.clone(), "/files", None, &rpc("tools/list", 1)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json(), rpc_result(json!(1), json!({ "method": "tools/list" })));

    let second = post_json(router, "/files", None, &rpc("resources/list", 2)).await;
    assert_eq!(second.json()["result"]["method"], "resources/list");

    assert_eq!(
        harness.runtime.calls_of("exec "),
        vec!["exec mcp-compose-files node server.js --stdio".to_string()]
    );
}

#[tokio::test]
async fn test_stdio_notification_is_accepted_without_body() {
    let harness = ProxyHarness::new(
        manifest(
            r#"
            [servers.files]
            image = "example/files:1"
            command = ["node", "server.js"]
            "#,
        ),
        MockRuntime::new().with_running("files"),
    );
    let notification = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let response = post_json(harness.router(), "/files", None, &notification).await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_forwarded_request_is_published() {
    let upstream = echo_upstream().await;
    let bus = ActivityBus::start(ActivityBusConfig::default(), None);
    let (sink, mut rx) = RecordingSink::new();
    let _subscription = bus.subscribe(Box::new(sink));

    let harness = ProxyHarness::build(
        remote_server_manifest("remote", &format!("{}/mcp", upstream.uri()), None),
        MockRuntime::new(),
        ActivityPublisher::Local(bus.clone()),
        None,
        |_| {},
    );
    let request = Request::post("/remote")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-client-id", "claude-desktop")
        .body(Body::from(rpc("tools/list", 1).to_string()))
        .unwrap();
    send(harness.router(), request).await;

    let event = wait_for_event(&mut rx, Duration::from_secs(2), |e| e.kind == kinds::REQUEST)
        .await
        .expect("request event");
    assert_eq!(event.server.as_deref(), Some("remote"));
    assert_eq!(event.client.as_deref(), Some("claude-desktop"));
    assert_eq!(event.details.unwrap()["method"], "tools/list");
    bus.shutdown().await;
}
