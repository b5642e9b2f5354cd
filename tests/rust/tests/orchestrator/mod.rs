//! Orchestrator integration tests
//!
//! Drives [`Compose`] over a manifest file on disk and the in-memory engine.

mod services;

use std::sync::Arc;
use std::time::Duration;

use mcp_compose_core::ActivityPublisher;
use mcp_compose_orchestrator::{Compose, ServiceTiming};
use tempfile::TempDir;
use tests::fixtures::{no_env, write_manifest};
use tests::MockRuntime;

/// Three servers in a dependency chain plus one remote
pub const CHAIN: &str = r#"
    [servers.db]
    image = "postgres:16"

    [servers.api]
    image = "ghcr.io/acme/api:1"
    depends_on = ["db"]

    [servers.web]
    image = "ghcr.io/acme/web:1"
    protocol = "http"
    http_port = 8080
    depends_on = ["api"]

    [servers.remote]
    url = "https://mcp.example.com/mcp"
    protocol = "http"

    [networks.backend]
    driver = "overlay"

    [networks.shared]
    external = true
"#;

pub struct ComposeHarness {
    pub dir: TempDir,
    pub runtime: Arc<MockRuntime>,
    pub compose: Compose,
}

impl ComposeHarness {
    pub fn new(text: &str) -> Self {
        Self::with_runtime(text, MockRuntime::new(), ActivityPublisher::Disabled)
    }

    pub fn with_runtime(text: &str, runtime: MockRuntime, publisher: ActivityPublisher) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_manifest(dir.path(), text);
        let runtime = Arc::new(runtime);
        let compose = Compose::load(runtime.clone(), publisher, path, no_env())
            .expect("load manifest")
            .with_timing(fast_timing());
        Self {
            dir,
            runtime,
            compose,
        }
    }

    /// Replace the manifest on disk; the next `reload` picks it up.
    pub fn rewrite(&self, text: &str) {
        write_manifest(self.dir.path(), text);
    }
}

pub fn fast_timing() -> ServiceTiming {
    ServiceTiming {
        health_timeout: Duration::from_millis(500),
        health_interval: Duration::from_millis(10),
        restart_pause: Duration::from_millis(10),
    }
}

pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
