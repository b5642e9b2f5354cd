//! Memory server and its Postgres

use async_trait::async_trait;
use mcp_compose_core::domain::manifest::MemorySection;
use mcp_compose_core::{branding, ConfigError, Protocol, ResourceLimits, ServerConfig, WorkloadSpec};
use tracing::info;

use super::{
    ensure_default_network, ensure_image, hardened, service_url, wait_running, AuxiliaryService,
    BuildRecipe, ServiceContext, StartOutcome,
};
use crate::error::ComposeResult;

const SERVICE: &str = "memory";
const POSTGRES: &str = "memory-postgres";
const POSTGRES_PORT: u16 = 5432;
const POSTGRES_VOLUME: &str = "mcp-compose-memory-pgdata";
const DOCKERFILE: &str = include_str!("dockerfiles/memory.Dockerfile");

/// Capabilities the Postgres entrypoint needs to fix up its data directory
const POSTGRES_CAPS: &[&str] = &["CHOWN", "DAC_OVERRIDE", "FOWNER", "SETGID", "SETUID"];

pub struct MemoryService {
    section: MemorySection,
}

impl MemoryService {
    pub fn new(section: MemorySection) -> Self {
        Self { section }
    }

    fn password(&self) -> ComposeResult<&str> {
        self.section
            .postgres_password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConfigError::Missing("POSTGRES_PASSWORD".to_string()).into())
    }

    /// Connection string handed to the memory server.
    pub fn database_url(&self) -> ComposeResult<String> {
        if let Some(url) = &self.section.postgres_url {
            return Ok(url.clone());
        }
        Ok(format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.section.postgres_user,
            self.password()?,
            branding::container_name(POSTGRES),
            POSTGRES_PORT,
            self.section.postgres_db
        ))
    }

    fn postgres_spec(&self) -> ComposeResult<WorkloadSpec> {
        let mut spec = hardened(
            WorkloadSpec::new(POSTGRES, self.section.postgres_image.clone()),
            SERVICE,
        )
        .with_env("POSTGRES_USER", self.section.postgres_user.clone())
        .with_env("POSTGRES_DB", self.section.postgres_db.clone())
        .with_env("POSTGRES_PASSWORD", self.password()?);
        spec.security.cap_add = POSTGRES_CAPS.iter().map(|c| c.to_string()).collect();
        spec.volumes = vec![format!("{}:/var/lib/postgresql/data", POSTGRES_VOLUME)];
        Ok(spec)
    }

    fn server_spec(&self, image: String) -> ComposeResult<WorkloadSpec> {
        let mut spec = hardened(WorkloadSpec::new(SERVICE, image), SERVICE)
            .with_env("DATABASE_URL", self.database_url()?)
            .with_env("PORT", self.section.port.to_string());
        spec.ports = vec![format!("{0}:{0}", self.section.port)];
        spec.resources = ResourceLimits {
            cpus: self.section.cpus,
            memory: self.section.memory.clone(),
        };
        Ok(spec)
    }
}

#[async_trait]
impl AuxiliaryService for MemoryService {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn start(&self, ctx: &ServiceContext) -> ComposeResult<StartOutcome> {
        let runtime = ctx.runtime.as_ref();
        let container = self.container();
        if runtime.status(&container).await?.is_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let postgres = self.postgres_spec()?;
        ensure_default_network(runtime).await?;

        let postgres_container = postgres.container_name();
        if !runtime.status(&postgres_container).await?.is_running() {
            ensure_image(
                runtime,
                POSTGRES,
                Some(&self.section.postgres_image),
                BuildRecipe::dockerfile(DOCKERFILE),
            )
            .await?;
            info!(container = %postgres_container, "[Services] Starting memory database");
            runtime.start(&postgres).await?;
            wait_running(runtime, &postgres_container, &ctx.timing).await?;
        }

        let image = ensure_image(
            runtime,
            SERVICE,
            self.section.image.as_deref(),
            BuildRecipe::dockerfile(DOCKERFILE),
        )
        .await?;
        let spec = self.server_spec(image)?;
        info!(container = %container, "[Services] Starting memory server");
        runtime.start(&spec).await?;
        wait_running(runtime, &container, &ctx.timing).await?;

        ctx.announce(SERVICE, "start", "Memory server started".to_string());
        Ok(StartOutcome::Started)
    }

    async fn stop(&self, ctx: &ServiceContext) -> ComposeResult<()> {
        ctx.runtime.stop(&self.container()).await?;
        ctx.runtime
            .stop(&branding::container_name(POSTGRES))
            .await?;
        ctx.announce(SERVICE, "stop", "Memory server stopped".to_string());
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
