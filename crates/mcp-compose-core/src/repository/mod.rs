//! Data access and control traits
//!
//! Storage and orchestration are implemented in other crates; these traits
//! are the seams the bus and the HTTP surfaces depend on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{ActivityEvent, Manifest, Protocol, WorkloadStatus};
use crate::error::ConfigError;

/// Result type for repository operations
pub type RepoResult<T> = anyhow::Result<T>;

/// Aggregate counters over the durable activity store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total: u64,
    pub by_severity: BTreeMap<String, u64>,
    pub by_kind: BTreeMap<String, u64>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Durable activity store
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Append one event
    async fn insert(&self, event: &ActivityEvent) -> RepoResult<()>;

    /// Most recent events, newest first, optionally only those after `since`
    async fn recent(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> RepoResult<Vec<ActivityEvent>>;

    /// Aggregate counters
    async fn stats(&self) -> RepoResult<ActivityStats>;

    /// Delete rows inserted before `cutoff`; returns the number removed
    async fn prune(&self, cutoff: DateTime<Utc>) -> RepoResult<usize>;
}

/// One declared server as seen by `ps` and upstream discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerState {
    pub server: String,
    pub container: String,
    pub status: WorkloadStatus,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
}

/// Outcome of a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadSummary {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    pub recreated: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Failures surfaced through [`ComposeControl`].
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown server '{0}'")]
    UnknownServer(String),

    #[error("No container engine available")]
    EngineAbsent,

    #[error("{0}")]
    Engine(String),
}

/// Lifecycle control exposed to the proxy and dashboard.
#[async_trait]
pub trait ComposeControl: Send + Sync {
    /// Snapshot of the currently loaded manifest
    async fn manifest(&self) -> Manifest;

    /// Status of every declared server
    async fn ps(&self) -> Result<Vec<ServerState>, ControlError>;

    /// Re-read the manifest and converge
    async fn reload(&self) -> Result<ReloadSummary, ControlError>;

    async fn start_server(&self, server: &str) -> Result<(), ControlError>;

    async fn stop_server(&self, server: &str) -> Result<(), ControlError>;

    async fn restart_server(&self, server: &str) -> Result<(), ControlError>;
}
