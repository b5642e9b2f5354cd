//! The runtime driver contract

use async_trait::async_trait;
use mcp_compose_core::{BuildContext, WorkloadRecord, WorkloadSpec, WorkloadStatus};

use crate::error::RuntimeResult;
use crate::exec::ExecSession;
use crate::logs::{LogOptions, LogStream};

/// A container engine the orchestrator can drive.
///
/// Every operation addresses workloads by canonical container name. The
/// engine is the source of truth; implementations keep no workload cache.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Engine name for logs and the dashboard (`docker`, `podman`, `none`)
    fn engine(&self) -> &'static str;

    /// Bring a workload up, replacing any container with the same name.
    /// Returns the runtime id.
    async fn start(&self, spec: &WorkloadSpec) -> RuntimeResult<String>;

    /// Stop and remove. Absent containers are not an error.
    async fn stop(&self, name: &str) -> RuntimeResult<()>;

    /// Force-remove. Absent containers are not an error.
    async fn remove(&self, name: &str) -> RuntimeResult<()>;

    /// Normalized status; absence is `Stopped`.
    async fn status(&self, name: &str) -> RuntimeResult<WorkloadStatus>;

    async fn inspect(&self, name: &str) -> RuntimeResult<Option<WorkloadRecord>>;

    /// All containers whose name starts with `prefix`
    async fn list(&self, prefix: &str) -> RuntimeResult<Vec<WorkloadRecord>>;

    /// Log stream; follow mode stays open until the container stops or the
    /// stream is dropped.
    async fn logs(&self, name: &str, options: &LogOptions) -> RuntimeResult<LogStream>;

    /// One-shot resource usage snapshot
    async fn stats(&self, name: &str) -> RuntimeResult<serde_json::Value>;

    async fn network_exists(&self, name: &str) -> RuntimeResult<bool>;

    /// Create a network. Already existing is not an error.
    async fn network_create(&self, name: &str, driver: &str) -> RuntimeResult<()>;

    /// Remove a network. Not found is not an error; in use is `Busy`.
    async fn network_remove(&self, name: &str) -> RuntimeResult<()>;

    /// Attach a running container to a network. Already attached is not an error.
    async fn connect_network(&self, network: &str, name: &str) -> RuntimeResult<()>;

    async fn image_exists(&self, image: &str) -> RuntimeResult<bool>;

    async fn build_image(&self, build: &BuildContext, tag: &str) -> RuntimeResult<()>;

    async fn pull_image(&self, image: &str) -> RuntimeResult<()>;

    /// Run `command` inside a running container with piped stdin/stdout.
    async fn exec(
        &self,
        name: &str,
        command: &[String],
        interactive: bool,
    ) -> RuntimeResult<ExecSession>;
}
