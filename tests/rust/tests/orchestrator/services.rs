//! Auxiliary services brought up alongside declared servers

use mcp_compose_core::{branding, ComposeControl, Protocol, WorkloadStatus};
use mcp_compose_orchestrator::StartOutcome;
use pretty_assertions::assert_eq;

use super::{names, ComposeHarness};

const WITH_SCHEDULER: &str = r#"
    [servers.files]
    image = "ghcr.io/acme/files:1"

    [task_scheduler]
    enabled = true
"#;

const SCHEDULER: &str = "mcp-compose-task-scheduler";

#[tokio::test]
async fn test_full_up_starts_enabled_services() {
    let harness = ComposeHarness::new(WITH_SCHEDULER);

    let summary = harness.compose.up(&[]).await.unwrap();

    assert_eq!(summary.started, names(&["files"]));
    assert_eq!(summary.services.get("task-scheduler"), Some(&StartOutcome::Started));
    assert!(harness.runtime.is_running(SCHEDULER));
    // no image configured, so the embedded recipe is built once
    assert_eq!(
        harness.runtime.calls_of("build "),
        vec![format!("build {}", branding::built_image_tag("task-scheduler"))]
    );
}

#[tokio::test]
async fn test_selected_up_skips_services() {
    let harness = ComposeHarness::new(WITH_SCHEDULER);

    let summary = harness.compose.up(&names(&["files"])).await.unwrap();

    assert!(summary.services.is_empty());
    assert!(!harness.runtime.is_running(SCHEDULER));
}

#[tokio::test]
async fn test_services_ps_and_down() {
    let harness = ComposeHarness::new(WITH_SCHEDULER);
    harness.compose.up(&[]).await.unwrap();

    let states = harness.compose.services_ps().await.unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].server, "task-scheduler");
    assert_eq!(states[0].status, WorkloadStatus::Running);

    harness.compose.down(&[]).await.unwrap();
    assert!(!harness.runtime.is_running(SCHEDULER));
    assert!(!harness.runtime.is_running("mcp-compose-files"));
}

#[tokio::test]
async fn test_service_is_a_lifecycle_target() {
    let harness = ComposeHarness::new(WITH_SCHEDULER);

    harness.compose.start("task-scheduler").await.unwrap();
    assert!(harness.runtime.is_running(SCHEDULER));

    harness.compose.stop("task-scheduler").await.unwrap();
    assert!(!harness.runtime.is_running(SCHEDULER));
}

#[tokio::test]
async fn test_routed_manifest_includes_service_endpoint() {
    let harness = ComposeHarness::new(WITH_SCHEDULER);

    let routed = ComposeControl::manifest(&harness.compose).await;

    let route = routed.servers.get("task-scheduler").expect("scheduler route");
    assert_eq!(route.protocol, Protocol::Http);
    assert_eq!(
        route.url.as_deref(),
        Some("http://mcp-compose-task-scheduler:8018/mcp")
    );
    // the file itself is untouched
    assert!(!harness.compose.snapshot().await.servers.contains_key("task-scheduler"));
}
