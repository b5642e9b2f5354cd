//! Task scheduler

use async_trait::async_trait;
use mcp_compose_core::domain::manifest::TaskSchedulerSection;
use mcp_compose_core::{Protocol, ResourceLimits, ServerConfig, WorkloadSpec};
use tracing::info;

use super::{
    ensure_default_network, ensure_image, hardened, service_url, wait_running, AuxiliaryService,
    BuildRecipe, ServiceContext, StartOutcome,
};
use crate::error::ComposeResult;

/// Also the server name the scheduler REST shim dispatches to
const SERVICE: &str = "task-scheduler";
const WORKSPACE_MOUNT: &str = "/workspace";
const DOCKERFILE: &str = include_str!("dockerfiles/task-scheduler.Dockerfile");

pub struct SchedulerService {
    section: TaskSchedulerSection,
}

impl SchedulerService {
    pub fn new(section: TaskSchedulerSection) -> Self {
        Self { section }
    }

    fn spec(&self, image: String) -> WorkloadSpec {
        let mut spec = hardened(WorkloadSpec::new(SERVICE, image), SERVICE)
            .with_env("PORT", self.section.port.to_string());
        spec.ports = vec![format!("{0}:{0}", self.section.port)];
        if let Some(workspace) = &self.section.workspace {
            spec.volumes = vec![format!("{}:{}", workspace, WORKSPACE_MOUNT)];
        }
        spec.resources = ResourceLimits {
            cpus: self.section.cpus,
            memory: self.section.memory.clone(),
        };
        spec
    }
}

#[async_trait]
impl AuxiliaryService for SchedulerService {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn start(&self, ctx: &ServiceContext) -> ComposeResult<StartOutcome> {
        let runtime = ctx.runtime.as_ref();
        let container = self.container();
        if runtime.status(&container).await?.is_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        ensure_default_network(runtime).await?;
        let image = ensure_image(
            runtime,
            SERVICE,
            self.section.image.as_deref(),
            BuildRecipe::dockerfile(DOCKERFILE),
        )
        .await?;

        info!(container = %container, "[Services] Starting task scheduler");
        runtime.start(&self.spec(image)).await?;
        wait_running(runtime, &container, &ctx.timing).await?;

        ctx.announce(SERVICE, "start", "Task scheduler started".to_string());
        Ok(StartOutcome::Started)
    }

    async fn stop(&self, ctx: &ServiceContext) -> ComposeResult<()> {
        ctx.runtime.stop(&self.container()).await?;
        ctx.announce(SERVICE, "stop", "Task scheduler stopped".to_string());
        Ok(())
    }

    fn route(&self, upstream_host: Option<&str>) -> Option<ServerConfig> {
        Some(ServerConfig {
            protocol: Protocol::Http,
            http_port: Some(self.section.port),
            url: Some(service_url(SERVICE, self.section.port, upstream_host)),
            ..Default::default()
        })
    }
}
