//! Index page, health, server docs and the `/api/` passthrough

use axum::http::StatusCode;
use mcp_compose_core::ActivityPublisher;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::http::{get, post_json};
use wiremock::matchers::{body_json, header as header_matcher, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use super::{DashboardHarness, API_KEY};

#[tokio::test]
async fn test_index_lists_servers() {
    let harness = DashboardHarness::new().await;
    let response = get(harness.router(), "/", None).await;

    assert_eq!(response.status, StatusCode::OK);
    let page = response.text();
    assert!(page.contains(r#"data-theme="light""#));
    assert!(page.contains(r#"data-server="files""#));
    assert!(page.contains(&harness.proxy.address().to_string()));
}

#[tokio::test]
async fn test_health_reports_engine_and_sessions() {
    let harness = DashboardHarness::build(Some(API_KEY), ActivityPublisher::Disabled, None).await;
    let response = get(harness.router(), "/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({ "status": "ok", "engine": "mock", "sessions": 0, "activityBus": false })
    );
}

#[tokio::test]
async fn test_api_passthrough_carries_bearer_and_query() {
    let harness = DashboardHarness::build(Some(API_KEY), ActivityPublisher::Disabled, None).await;
    Mock::given(method("GET"))
        .and(path("/api/containers/files/logs"))
        .and(query_param("tail", "20"))
        .and(header_matcher("authorization", format!("Bearer {}", API_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "server": "files", "level": "INFO", "message": "ready" }
        ])))
        .expect(1)
        .mount(&harness.proxy)
        .await;

    let response = get(harness.router(), "/api/containers/files/logs?tail=20", Some(API_KEY)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()[0]["message"], "ready");
    harness.proxy.verify().await;
}

#[tokio::test]
async fn test_api_passthrough_forwards_body_and_status() {
    let harness = DashboardHarness::new().await;
    Mock::given(method("POST"))
        .and(path("/api/servers/restart"))
        .and(body_json(json!({ "server": "files" })))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Unknown server 'files'" })),
        )
        .mount(&harness.proxy)
        .await;

    let response = post_json(
        harness.router(),
        "/api/servers/restart",
        None,
        &json!({ "server": "files" }),
    )
    .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error"], "Unknown server 'files'");
}

#[tokio::test]
async fn test_passthrough_requires_dashboard_token() {
    let harness = DashboardHarness::build(Some(API_KEY), ActivityPublisher::Disabled, None).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.proxy)
        .await;

    let response = get(harness.router(), "/api/servers", None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    harness.proxy.verify().await;
}

#[tokio::test]
async fn test_unreachable_proxy_is_bad_gateway() {
    let mut harness = DashboardHarness::new().await;
    // a router whose proxy address no longer answers
    let state = harness.server.state().clone();
    let mut config = (*state.config).clone();
    config.proxy_url = "http://127.0.0.1:9".to_string();
    let state = mcp_compose_gateway::DashboardState::new(
        config,
        state.runtime.clone(),
        ActivityPublisher::Disabled,
        None,
    )
    .unwrap();
    harness.server = mcp_compose_gateway::DashboardServer::new(state);

    let response = get(harness.router(), "/api/servers", None).await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_server_docs_links_are_rewritten() {
    let harness = DashboardHarness::new().await;
    Mock::given(method("GET"))
        .and(path("/files/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><script>SwaggerUIBundle({ url: "/openapi.json" })</script></html>"#,
            "text/html; charset=utf-8",
        ))
        .mount(&harness.proxy)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "openapi": "3.1.0" })))
        .mount(&harness.proxy)
        .await;
    let router = harness.router();

    let docs = get(router.clone(), "/api/server-docs/files", None).await;
    assert_eq!(docs.status, StatusCode::OK);
    assert!(docs
        .text()
        .contains(r#"url: "/api/server-docs/files/openapi.json""#));

    let spec = get(router, "/api/server-docs/files/openapi.json", None).await;
    assert_eq!(spec.status, StatusCode::OK);
    assert_eq!(spec.json()["openapi"], "3.1.0");
}

#[tokio::test]
async fn test_server_docs_missing_upstream_is_not_found() {
    let harness = DashboardHarness::new().await;
    Mock::given(method("GET"))
        .and(path("/files/docs"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no docs"))
        .mount(&harness.proxy)
        .await;

    let response = get(harness.router(), "/api/server-docs/files", None).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error"], "no docs");
}
