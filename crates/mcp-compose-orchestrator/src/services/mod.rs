//! Auxiliary services
//!
//! Containers the orchestrator owns besides the declared servers: the memory
//! server with its Postgres, the task scheduler and the containerized
//! dashboard. Each is a small state machine:
//!
//! ```text
//!  Start:   status? ──running──▶ done
//!              │
//!              └─▶ image (pull | build embedded Dockerfile)
//!                   ─▶ dependencies up ─▶ run ─▶ poll status (1s, ≤30s)
//!  Stop:    stop service (and dependencies it owns)
//!  Restart: Stop ─▶ pause ─▶ Start
//! ```

mod dashboard;
mod memory;
mod scheduler;

pub use dashboard::DashboardService;
pub use memory::MemoryService;
pub use scheduler::SchedulerService;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcp_compose_core::{
    branding, kinds, ActivityEvent, ActivityPublisher, BuildContext, Manifest, RestartPolicy,
    ServerConfig, WorkloadSpec,
};
use mcp_compose_runtime::ContainerRuntime;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ComposeError, ComposeResult};

/// Status polling used while a service comes up, and the pause inside restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceTiming {
    pub health_timeout: Duration,
    pub health_interval: Duration,
    pub restart_pause: Duration,
}

impl Default for ServiceTiming {
    fn default() -> Self {
        Self {
            health_timeout: Duration::from_secs(30),
            health_interval: Duration::from_secs(1),
            restart_pause: Duration::from_secs(2),
        }
    }
}

/// What a service needs from the orchestrator.
#[derive(Clone)]
pub struct ServiceContext {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub publisher: ActivityPublisher,
    pub timing: ServiceTiming,
}

impl ServiceContext {
    pub(crate) fn announce(&self, service: &str, action: &str, message: String) {
        self.publisher.publish(
            ActivityEvent::info(kinds::SERVICE, message)
                .with_server(service)
                .with_detail("action", action),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    AlreadyRunning,
    Started,
}

#[async_trait]
pub trait AuxiliaryService: Send + Sync {
    /// Service name; also the server name its proxy route is registered under
    fn name(&self) -> &'static str;

    fn container(&self) -> String {
        branding::container_name(self.name())
    }

    async fn start(&self, ctx: &ServiceContext) -> ComposeResult<StartOutcome>;

    async fn stop(&self, ctx: &ServiceContext) -> ComposeResult<()>;

    async fn restart(&self, ctx: &ServiceContext) -> ComposeResult<StartOutcome> {
        self.stop(ctx).await?;
        tokio::time::sleep(ctx.timing.restart_pause).await;
        self.start(ctx).await
    }

    /// Proxy route for services that speak MCP
    fn route(&self, _upstream_host: Option<&str>) -> Option<ServerConfig> {
        None
    }
}

/// Services enabled in `manifest`, in start order.
pub fn enabled_services(
    manifest: &Manifest,
    manifest_path: Option<&PathBuf>,
) -> Vec<Box<dyn AuxiliaryService>> {
    let mut services: Vec<Box<dyn AuxiliaryService>> = Vec::new();
    if manifest.memory.enabled {
        services.push(Box::new(MemoryService::new(manifest.memory.clone())));
    }
    if manifest.task_scheduler.enabled {
        services.push(Box::new(SchedulerService::new(
            manifest.task_scheduler.clone(),
        )));
    }
    if manifest.dashboard.enabled && manifest.dashboard.containerized {
        services.push(Box::new(DashboardService::new(
            manifest.dashboard.clone(),
            manifest.proxy.clone(),
            manifest_path.cloned(),
        )));
    }
    services
}

/// How to produce a service image when none is configured.
pub(crate) struct BuildRecipe {
    pub dockerfile: &'static str,
    /// Extra files copied into the context: (name in context, source path)
    pub files: Vec<(String, PathBuf)>,
}

impl BuildRecipe {
    pub fn dockerfile(dockerfile: &'static str) -> Self {
        Self {
            dockerfile,
            files: Vec::new(),
        }
    }
}

/// Image to run for a service: the configured image (pulled when missing)
/// or the deterministic local tag built from the embedded recipe.
pub(crate) async fn ensure_image(
    runtime: &dyn ContainerRuntime,
    service: &str,
    configured: Option<&str>,
    recipe: BuildRecipe,
) -> ComposeResult<String> {
    if let Some(image) = configured.filter(|i| !i.is_empty()) {
        if !runtime.image_exists(image).await? {
            info!(service = %service, image = %image, "[Services] Pulling image");
            runtime.pull_image(image).await?;
        }
        return Ok(image.to_string());
    }

    let tag = branding::built_image_tag(service);
    if runtime.image_exists(&tag).await? {
        debug!(service = %service, image = %tag, "[Services] Image present");
        return Ok(tag);
    }

    let staging = |source| ComposeError::Staging {
        service: service.to_string(),
        source,
    };
    let dir = tempfile::tempdir().map_err(staging)?;
    tokio::fs::write(dir.path().join("Dockerfile"), recipe.dockerfile)
        .await
        .map_err(staging)?;
    for (name, source) in &recipe.files {
        tokio::fs::copy(source, dir.path().join(name))
            .await
            .map_err(staging)?;
    }

    info!(service = %service, image = %tag, "[Services] Building image from embedded Dockerfile");
    runtime
        .build_image(&BuildContext::new(dir.path()), &tag)
        .await?;
    Ok(tag)
}

/// Poll until `container` reports running.
pub(crate) async fn wait_running(
    runtime: &dyn ContainerRuntime,
    container: &str,
    timing: &ServiceTiming,
) -> ComposeResult<()> {
    let started = tokio::time::Instant::now();
    loop {
        if runtime.status(container).await?.is_running() {
            return Ok(());
        }
        if started.elapsed() >= timing.health_timeout {
            return Err(ComposeError::HealthTimeout {
                service: container.to_string(),
                waited: timing.health_timeout,
            });
        }
        tokio::time::sleep(timing.health_interval).await;
    }
}

pub(crate) async fn ensure_default_network(runtime: &dyn ContainerRuntime) -> ComposeResult<()> {
    runtime
        .network_create(branding::DEFAULT_NETWORK, branding::DEFAULT_NETWORK_DRIVER)
        .await?;
    Ok(())
}

/// Defaults every service container runs with.
pub(crate) fn hardened(mut spec: WorkloadSpec, service: &str) -> WorkloadSpec {
    spec.restart = Some(RestartPolicy::UnlessStopped);
    spec.security.cap_drop = vec!["ALL".to_string()];
    spec.security.no_new_privileges = true;
    spec.interactive = false;
    spec.with_label(branding::LABEL_SERVICE, service)
        .with_label(branding::LABEL_SERVER, service)
        .with_network(branding::DEFAULT_NETWORK)
}

/// URL of a service's MCP endpoint as the proxy sees it.
pub(crate) fn service_url(service: &str, port: u16, upstream_host: Option<&str>) -> String {
    let host = match upstream_host {
        Some(host) => host.to_string(),
        None => branding::container_name(service),
    };
    format!("http://{}:{}/mcp", host, port)
}
