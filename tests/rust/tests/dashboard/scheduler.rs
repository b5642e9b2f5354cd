//! Task scheduler REST shim

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::http::{get, post_json, send};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use super::DashboardHarness;

#[tokio::test]
async fn test_list_tasks_unwraps_tool_output() {
    let harness = DashboardHarness::new().await;
    harness.mount_initialize("task-scheduler").await;
    harness
        .mount_scheduler_tool(
            "list_tasks",
            json!([{ "id": "t1", "schedule": "*/5 * * * *", "enabled": true }]),
        )
        .await;
    let router = harness.router();

    let response = get(router.clone(), "/api/task-scheduler/tasks", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()[0]["id"], "t1");

    // the short-lived session is gone afterwards
    let sessions = get(router, "/api/inspector/sessions", None).await.json();
    assert_eq!(sessions, json!([]));
}

#[tokio::test]
async fn test_run_task_passes_id_argument() {
    let harness = DashboardHarness::new().await;
    harness.mount_initialize("task-scheduler").await;
    Mock::given(method("POST"))
        .and(path("/task-scheduler"))
        .and(body_partial_json(json!({
            "method": "tools/call",
            "params": { "name": "run_task", "arguments": { "id": "nightly" } },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "result": { "content": [{ "type": "text", "text": "{\"started\":true}" }] },
        })))
        .expect(1)
        .mount(&harness.proxy)
        .await;

    let response = post_json(harness.router(), "/api/task-scheduler/tasks/nightly/run", None, &json!({})).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "started": true }));
    harness.proxy.verify().await;
}

#[tokio::test]
async fn test_add_task_forwards_body() {
    let harness = DashboardHarness::new().await;
    harness.mount_initialize("task-scheduler").await;
    let task = json!({ "name": "backup", "schedule": "0 3 * * *", "command": "backup.sh" });
    Mock::given(method("POST"))
        .and(path("/task-scheduler"))
        .and(body_partial_json(json!({
            "params": { "name": "add_task", "arguments": task.clone() },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "result": { "content": [{ "type": "text", "text": "{\"id\":\"t2\"}" }] },
        })))
        .expect(1)
        .mount(&harness.proxy)
        .await;

    let response = post_json(harness.router(), "/api/task-scheduler/tasks", None, &task).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["id"], "t2");
    harness.proxy.verify().await;
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let harness = DashboardHarness::new().await;
    let request = Request::delete("/api/task-scheduler/tasks/t1")
        .body(Body::empty())
        .unwrap();

    let response = send(harness.router(), request).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tool_error_is_bad_gateway() {
    let harness = DashboardHarness::new().await;
    harness.mount_initialize("task-scheduler").await;
    Mock::given(method("POST"))
        .and(path("/task-scheduler"))
        .and(body_partial_json(json!({ "method": "tools/call" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": { "code": -32000, "message": "task not found" },
        })))
        .mount(&harness.proxy)
        .await;
    let router = harness.router();

    let response = post_json(router.clone(), "/api/task-scheduler/tasks/ghost/enable", None, &json!({})).await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert!(response.json()["error"]
        .as_str()
        .unwrap()
        .contains("task not found"));

    let sessions = get(router, "/api/inspector/sessions", None).await.json();
    assert_eq!(sessions, json!([]));
}

#[tokio::test]
async fn test_invalid_body_is_bad_request() {
    let harness = DashboardHarness::new().await;
    let request = Request::post("/api/task-scheduler/tasks")
        .header("content-type", "application/json")
        .body(Body::from("{oops"))
        .unwrap();

    let response = send(harness.router(), request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
