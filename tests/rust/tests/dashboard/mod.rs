//! Dashboard integration tests
//!
//! The dashboard router driven in-process, with wiremock standing in for the
//! proxy it talks to.

mod inspector;
mod passthrough;
mod scheduler;

use std::sync::Arc;

use axum::Router;
use mcp_compose_core::{ActivityPublisher, ActivityStore};
use mcp_compose_gateway::{DashboardConfig, DashboardServer, DashboardState};
use serde_json::{json, Value};
use tests::fixtures::{manifest, rpc_result};
use tests::MockRuntime;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "dash-key";

pub struct DashboardHarness {
    /// Stands in for the proxy
    pub proxy: MockServer,
    pub server: DashboardServer,
}

impl DashboardHarness {
    pub async fn new() -> Self {
        Self::build(None, ActivityPublisher::Disabled, None).await
    }

    pub async fn build(
        api_key: Option<&str>,
        publisher: ActivityPublisher,
        store: Option<Arc<dyn ActivityStore>>,
    ) -> Self {
        let proxy = MockServer::start().await;
        let key = api_key
            .map(|k| format!("api_key = \"{}\"", k))
            .unwrap_or_default();
        let manifest = manifest(&format!(
            r#"
            [servers.files]
            image = "example/files:1"
            command = "node server.js"

            [proxy]
            {key}

            [dashboard]
            theme = "light"
            "#
        ));

        let mut config = DashboardConfig::from_manifest(&manifest);
        config.proxy_url = proxy.uri();
        let state = DashboardState::new(config, Arc::new(MockRuntime::new()), publisher, store)
            .expect("Failed to build dashboard state");
        Self {
            proxy,
            server: DashboardServer::new(state),
        }
    }

    pub fn router(&self) -> Router {
        self.server.build_router()
    }

    /// Answer `initialize` for `server` through the mock proxy.
    pub async fn mount_initialize(&self, server: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/{}", server)))
            .and(body_partial_json(json!({ "method": "initialize" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(
                json!(1),
                json!({
                    "protocolVersion": "2025-06-18",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": server, "version": "1.0.0" },
                }),
            )))
            .mount(&self.proxy)
            .await;
    }

    /// Answer a `tools/call` of `tool` on the scheduler with `output` as
    /// the text content.
    pub async fn mount_scheduler_tool(&self, tool: &str, output: Value) {
        Mock::given(method("POST"))
            .and(path("/task-scheduler"))
            .and(body_partial_json(json!({
                "method": "tools/call",
                "params": { "name": tool },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(
                json!(2),
                json!({ "content": [{ "type": "text", "text": output.to_string() }] }),
            )))
            .mount(&self.proxy)
            .await;
    }
}
