//! Containerized dashboard
//!
//! Runs this same binary's `dashboard` subcommand in a container. Without a
//! configured image the running executable is copied into a minimal image.

use std::path::PathBuf;

use async_trait::async_trait;
use mcp_compose_core::domain::manifest::{DashboardSection, ProxySection};
use mcp_compose_core::{ConfigError, WorkloadSpec};
use tracing::info;

use super::{
    ensure_default_network, ensure_image, hardened, wait_running, AuxiliaryService, BuildRecipe,
    ServiceContext, StartOutcome,
};
use crate::error::{ComposeError, ComposeResult};

const SERVICE: &str = "dashboard";
const MANIFEST_MOUNT: &str = "/etc/mcp-compose/mcp-compose.toml";
const BINARY_NAME: &str = "mcp-compose";
const DOCKERFILE: &str = include_str!("dockerfiles/dashboard.Dockerfile");

pub struct DashboardService {
    section: DashboardSection,
    proxy: ProxySection,
    manifest_path: Option<PathBuf>,
}

impl DashboardService {
    pub fn new(section: DashboardSection, proxy: ProxySection, manifest_path: Option<PathBuf>) -> Self {
        Self {
            section,
            proxy,
            manifest_path,
        }
    }

    /// Proxy address as seen from inside the container.
    pub fn proxy_url(&self) -> String {
        match &self.proxy.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://host.docker.internal:{}", self.proxy.port),
        }
    }

    fn spec(&self, image: String, manifest: &std::path::Path) -> WorkloadSpec {
        let mut spec = hardened(WorkloadSpec::new(SERVICE, image), SERVICE)
            .with_command(["-f", MANIFEST_MOUNT, "dashboard"])
            .with_env("MCP_DASHBOARD_HOST", "0.0.0.0")
            .with_env("MCP_DASHBOARD_PORT", self.section.port.to_string())
            .with_env("MCP_DASHBOARD_THEME", self.section.theme.clone())
            .with_env("MCP_PROXY_URL", self.proxy_url());
        if let Some(key) = &self.proxy.api_key {
            spec = spec.with_env("MCP_API_KEY", key.clone());
        }
        spec.ports = vec![format!("{0}:{0}", self.section.port)];
        spec.volumes = vec![format!("{}:{}:ro", manifest.display(), MANIFEST_MOUNT)];
        spec
    }

    fn recipe(&self) -> ComposeResult<BuildRecipe> {
        let exe = std::env::current_exe().map_err(|source| ComposeError::Staging {
            service: SERVICE.to_string(),
            source,
        })?;
        Ok(BuildRecipe {
            dockerfile: DOCKERFILE,
            files: vec![(BINARY_NAME.to_string(), exe)],
        })
    }
}

#[async_trait]
impl AuxiliaryService for DashboardService {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn start(&self, ctx: &ServiceContext) -> ComposeResult<StartOutcome> {
        let runtime = ctx.runtime.as_ref();
        let container = self.container();
        if runtime.status(&container).await?.is_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let manifest = self
            .manifest_path
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("manifest path for the dashboard".to_string()))?;
        let manifest = std::path::absolute(manifest).map_err(|source| ComposeError::Staging {
            service: SERVICE.to_string(),
            source,
        })?;

        ensure_default_network(runtime).await?;
        let recipe = match self.section.image.as_deref() {
            Some(_) => BuildRecipe::dockerfile(DOCKERFILE),
            None => self.recipe()?,
        };
        let image = ensure_image(runtime, SERVICE, self.section.image.as_deref(), recipe).await?;

        info!(container = %container, port = self.section.port, "[Services] Starting dashboard");
        runtime.start(&self.spec(image, &manifest)).await?;
        wait_running(runtime, &container, &ctx.timing).await?;

        ctx.announce(SERVICE, "start", "Dashboard container started".to_string());
        Ok(StartOutcome::Started)
    }

    async fn stop(&self, ctx: &ServiceContext) -> ComposeResult<()> {
        ctx.runtime.stop(&self.container()).await?;
        ctx.announce(SERVICE, "stop", "Dashboard container stopped".to_string());
        Ok(())
    }
}
