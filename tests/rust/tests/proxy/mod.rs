//! Proxy integration tests
//!
//! The proxy router driven in-process against a mock engine, with wiremock
//! standing in for upstream MCP servers and the authorization server.

mod forwarding;
mod lifecycle;

use std::sync::Arc;

use axum::Router;
use mcp_compose_core::{ActivityPublisher, ActivityStore, ComposeControl, Manifest};
use mcp_compose_gateway::{ProxyConfig, ProxyServer, ProxyState};
use mcp_compose_orchestrator::Compose;
use tests::MockRuntime;

pub struct ProxyHarness {
    pub runtime: Arc<MockRuntime>,
    pub server: ProxyServer,
}

impl ProxyHarness {
    pub fn new(manifest: Manifest, runtime: MockRuntime) -> Self {
        Self::build(manifest, runtime, ActivityPublisher::Disabled, None, |_| {})
    }

    pub fn build(
        manifest: Manifest,
        runtime: MockRuntime,
        publisher: ActivityPublisher,
        store: Option<Arc<dyn ActivityStore>>,
        tweak: impl FnOnce(&mut ProxyConfig),
    ) -> Self {
        let runtime = Arc::new(runtime);
        let mut config = ProxyConfig::from_section(&manifest.proxy);
        tweak(&mut config);
        let control: Arc<dyn ComposeControl> =
            Arc::new(Compose::new(runtime.clone(), publisher.clone(), manifest));
        let state = ProxyState::new(config, runtime.clone(), control, publisher, store)
            .expect("Failed to build proxy state");
        Self {
            runtime,
            server: ProxyServer::new(state),
        }
    }

    pub fn router(&self) -> Router {
        self.server.build_router()
    }
}
