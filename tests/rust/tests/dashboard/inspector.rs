//! Inspector session endpoints

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use mcp_compose_core::ActivityPublisher;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::fixtures::rpc_result;
use tests::http::{get, post_json, send, TestResponse};
use wiremock::matchers::{body_partial_json, header as header_matcher, method, path};
use wiremock::{Mock, ResponseTemplate};

use super::{DashboardHarness, API_KEY};

async fn connect_as(router: axum::Router, server: &str, owner: Option<&str>) -> TestResponse {
    let mut request = Request::post("/api/inspector/connect").header(header::CONTENT_TYPE, "application/json");
    if let Some(owner) = owner {
        request = request.header("x-client-id", owner);
    }
    send(
        router,
        request
            .body(Body::from(json!({ "server": server }).to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_session_lifecycle() {
    let harness = DashboardHarness::new().await;
    harness.mount_initialize("files").await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .and(body_partial_json(json!({ "method": "tools/list" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(rpc_result(json!(2), json!({ "tools": [{ "name": "read_file" }] }))),
        )
        .mount(&harness.proxy)
        .await;
    let router = harness.router();

    let connected = connect_as(router.clone(), "files", None).await;
    assert_eq!(connected.status, StatusCode::OK);
    let connected = connected.json();
    let session_id = connected["sessionId"].as_str().unwrap().to_string();
    assert_eq!(connected["capabilities"], json!({ "tools": {} }));
    assert_eq!(connected["serverInfo"]["name"], "files");

    let sessions = get(router.clone(), "/api/inspector/sessions", None).await.json();
    assert_eq!(sessions.as_array().unwrap().len(), 1);
    assert_eq!(sessions[0]["sessionId"], session_id.as_str());
    assert_eq!(sessions[0]["server"], "files");

    let response = post_json(
        router.clone(),
        "/api/inspector/request",
        None,
        &json!({ "sessionId": session_id, "method": "tools/list" }),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["result"]["tools"][0]["name"], "read_file");

    let disconnect = json!({ "sessionId": session_id });
    let first = post_json(router.clone(), "/api/inspector/disconnect", None, &disconnect).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["status"], "disconnected");

    let second = post_json(router.clone(), "/api/inspector/disconnect", None, &disconnect).await;
    assert_eq!(second.status, StatusCode::NOT_FOUND);

    let sessions = get(router, "/api/inspector/sessions", None).await.json();
    assert_eq!(sessions, json!([]));
}

#[tokio::test]
async fn test_request_on_unknown_session_is_not_found() {
    let harness = DashboardHarness::new().await;
    let response = post_json(
        harness.router(),
        "/api/inspector/request",
        None,
        &json!({ "sessionId": "missing", "method": "tools/list" }),
    )
    .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_owner_reuses_session() {
    let harness = DashboardHarness::new().await;
    harness.mount_initialize("files").await;
    let router = harness.router();

    let first = connect_as(router.clone(), "files", Some("alice")).await.json();
    let again = connect_as(router.clone(), "files", Some("alice")).await.json();
    let other = connect_as(router.clone(), "files", Some("bob")).await.json();
    let anonymous = connect_as(router.clone(), "files", None).await.json();

    assert_eq!(first["sessionId"], again["sessionId"]);
    assert_ne!(first["sessionId"], other["sessionId"]);
    assert_ne!(first["sessionId"], anonymous["sessionId"]);

    let sessions = get(router, "/api/inspector/sessions", None).await.json();
    assert_eq!(sessions.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_initialize_failure_still_opens_session() {
    let harness = DashboardHarness::new().await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
        .mount(&harness.proxy)
        .await;

    let connected = connect_as(harness.router(), "files", None).await;

    assert_eq!(connected.status, StatusCode::OK);
    let body = connected.json();
    assert!(!body["sessionId"].as_str().unwrap().is_empty());
    assert_eq!(body["capabilities"], json!({}));
    assert_eq!(body["serverInfo"], json!({}));
}

#[tokio::test]
async fn test_upstream_error_on_request_is_bad_gateway() {
    let harness = DashboardHarness::new().await;
    harness.mount_initialize("files").await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .and(body_partial_json(json!({ "method": "tools/call" })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&harness.proxy)
        .await;
    let router = harness.router();

    let session_id = connect_as(router.clone(), "files", None).await.json()["sessionId"].clone();
    let response = post_json(
        router,
        "/api/inspector/request",
        None,
        &json!({ "sessionId": session_id, "method": "tools/call", "params": { "name": "x" } }),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_bearer_is_required_and_forwarded() {
    let harness = DashboardHarness::build(Some(API_KEY), ActivityPublisher::Disabled, None).await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .and(header_matcher("authorization", format!("Bearer {}", API_KEY).as_str()))
        .and(body_partial_json(json!({ "method": "initialize" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(
            json!(1),
            json!({ "capabilities": { "prompts": {} }, "serverInfo": { "name": "files" } }),
        )))
        .expect(1)
        .mount(&harness.proxy)
        .await;
    let router = harness.router();

    let anonymous = post_json(router.clone(), "/api/inspector/connect", None, &json!({ "server": "files" })).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let connected = post_json(
        router,
        "/api/inspector/connect",
        Some(API_KEY),
        &json!({ "server": "files" }),
    )
    .await;
    assert_eq!(connected.status, StatusCode::OK);
    assert_eq!(connected.json()["capabilities"], json!({ "prompts": {} }));
    harness.proxy.verify().await;
}

#[tokio::test]
async fn test_invalid_server_name_is_rejected() {
    let harness = DashboardHarness::new().await;
    let response = post_json(
        harness.router(),
        "/api/inspector/connect",
        None,
        &json!({ "server": "../etc" }),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
