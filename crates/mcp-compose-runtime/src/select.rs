//! Boot-time engine selection
//!
//! Engines are probed in a fixed order (docker, then podman). The choice is
//! made once; when neither answers we select the null driver and say so.

use async_trait::async_trait;
use mcp_compose_core::{BuildContext, WorkloadRecord, WorkloadSpec, WorkloadStatus};
use tracing::{info, warn};

use crate::cli::{CliRuntime, EngineKind};
use crate::driver::ContainerRuntime;
use crate::error::RuntimeResult;
use crate::exec::ExecSession;
use crate::logs::{LogOptions, LogStream};
use crate::null::NullRuntime;

/// The selected driver
#[derive(Debug, Clone)]
pub enum Runtime {
    Docker(CliRuntime),
    Podman(CliRuntime),
    Null(NullRuntime),
}

impl Runtime {
    /// Probe docker then podman; fall back to the null driver.
    pub async fn detect() -> Self {
        for kind in [EngineKind::Docker, EngineKind::Podman] {
            if which::which(kind.as_str()).is_err() {
                continue;
            }
            let cli = CliRuntime::new(kind);
            if cli.probe().await {
                info!(engine = kind.as_str(), "[Runtime] Selected container engine");
                return Self::from_cli(cli);
            }
            warn!(engine = kind.as_str(), "[Runtime] Engine installed but not responding");
        }
        warn!("[Runtime] No container engine available; lifecycle operations will fail");
        Self::Null(NullRuntime)
    }

    /// Explicit selection by name (`docker`, `podman`, `none`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "docker" => Some(Self::Docker(CliRuntime::new(EngineKind::Docker))),
            "podman" => Some(Self::Podman(CliRuntime::new(EngineKind::Podman))),
            "none" | "null" => Some(Self::Null(NullRuntime)),
            _ => None,
        }
    }

    pub fn from_cli(cli: CliRuntime) -> Self {
        match cli.kind() {
            EngineKind::Docker => Self::Docker(cli),
            EngineKind::Podman => Self::Podman(cli),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    fn driver(&self) -> &dyn ContainerRuntime {
        match self {
            Self::Docker(cli) | Self::Podman(cli) => cli,
            Self::Null(null) => null,
        }
    }
}

#[async_trait]
impl ContainerRuntime for Runtime {
    fn engine(&self) -> &'static str {
        self.driver().engine()
    }

    async fn start(&self, spec: &WorkloadSpec) -> RuntimeResult<String> {
        self.driver().start(spec).await
    }

    async fn stop(&self, name: &str) -> RuntimeResult<()> {
        self.driver().stop(name).await
    }

    async fn remove(&self, name: &str) -> RuntimeResult<()> {
        self.driver().remove(name).await
    }

    async fn status(&self, name: &str) -> RuntimeResult<WorkloadStatus> {
        self.driver().status(name).await
    }

    async fn inspect(&self, name: &str) -> RuntimeResult<Option<WorkloadRecord>> {
        self.driver().inspect(name).await
    }

    async fn list(&self, prefix: &str) -> RuntimeResult<Vec<WorkloadRecord>> {
        self.driver().list(prefix).await
    }

    async fn logs(&self, name: &str, options: &LogOptions) -> RuntimeResult<LogStream> {
        self.driver().logs(name, options).await
    }

    async fn stats(&self, name: &str) -> RuntimeResult<serde_json::Value> {
        self.driver().stats(name).await
    }

    async fn network_exists(&self, name: &str) -> RuntimeResult<bool> {
        self.driver().network_exists(name).await
    }

    async fn network_create(&self, name: &str, driver: &str) -> RuntimeResult<()> {
        self.driver().network_create(name, driver).await
    }

    async fn network_remove(&self, name: &str) -> RuntimeResult<()> {
        self.driver().network_remove(name).await
    }

    async fn connect_network(&self, network: &str, name: &str) -> RuntimeResult<()> {
        self.driver().connect_network(network, name).await
    }

    async fn image_exists(&self, image: &str) -> RuntimeResult<bool> {
        self.driver().image_exists(image).await
    }

    async fn build_image(&self, build: &BuildContext, tag: &str) -> RuntimeResult<()> {
        self.driver().build_image(build, tag).await
    }

    async fn pull_image(&self, image: &str) -> RuntimeResult<()> {
        self.driver().pull_image(image).await
    }

    async fn exec(
        &self,
        name: &str,
        command: &[String],
        interactive: bool,
    ) -> RuntimeResult<ExecSession> {
        self.driver().exec(name, command, interactive).await
    }
}
