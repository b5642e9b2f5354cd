//! Null driver: used when no engine is installed. Every call fails with
//! `EngineAbsent` so upper layers can report it instead of guessing.

use async_trait::async_trait;
use mcp_compose_core::{BuildContext, WorkloadRecord, WorkloadSpec, WorkloadStatus};

use crate::driver::ContainerRuntime;
use crate::error::{RuntimeError, RuntimeResult};
use crate::exec::ExecSession;
use crate::logs::{LogOptions, LogStream};

#[derive(Debug, Clone, Copy, Default)]
pub struct NullRuntime;

#[async_trait]
impl ContainerRuntime for NullRuntime {
    fn engine(&self) -> &'static str {
        "none"
    }

    async fn start(&self, _spec: &WorkloadSpec) -> RuntimeResult<String> {
        Err(RuntimeError::engine_absent())
    }

    async fn stop(&self, _name: &str) -> RuntimeResult<()> {
        Err(RuntimeError::engine_absent())
    }

    async fn remove(&self, _name: &str) -> RuntimeResult<()> {
        Err(RuntimeError::engine_absent())
    }

    async fn status(&self, _name: &str) -> RuntimeResult<WorkloadStatus> {
        Err(RuntimeError::engine_absent())
    }

    async fn inspect(&self, _name: &str) -> RuntimeResult<Option<WorkloadRecord>> {
        Err(RuntimeError::engine_absent())
    }

    async fn list(&self, _prefix: &str) -> RuntimeResult<Vec<WorkloadRecord>> {
        Err(RuntimeError::engine_absent())
    }

    async fn logs(&self, _name: &str, _options: &LogOptions) -> RuntimeResult<LogStream> {
        Err(RuntimeError::engine_absent())
    }

    async fn stats(&self, _name: &str) -> RuntimeResult<serde_json::Value> {
        Err(RuntimeError::engine_absent())
    }

    async fn network_exists(&self, _name: &str) -> RuntimeResult<bool> {
        Err(RuntimeError::engine_absent())
    }

    async fn network_create(&self, _name: &str, _driver: &str) -> RuntimeResult<()> {
        Err(RuntimeError::engine_absent())
    }

    async fn network_remove(&self, _name: &str) -> RuntimeResult<()> {
        Err(RuntimeError::engine_absent())
    }

    async fn connect_network(&self, _network: &str, _name: &str) -> RuntimeResult<()> {
        Err(RuntimeError::engine_absent())
    }

    async fn image_exists(&self, _image: &str) -> RuntimeResult<bool> {
        Err(RuntimeError::engine_absent())
    }

    async fn build_image(&self, _build: &BuildContext, _tag: &str) -> RuntimeResult<()> {
        Err(RuntimeError::engine_absent())
    }

    async fn pull_image(&self, _image: &str) -> RuntimeResult<()> {
        Err(RuntimeError::engine_absent())
    }

    async fn exec(
        &self,
        _name: &str,
        _command: &[String],
        _interactive: bool,
    ) -> RuntimeResult<ExecSession> {
        Err(RuntimeError::engine_absent())
    }
}
