//! Orchestrator errors

use std::time::Duration;

use mcp_compose_core::{ConfigError, ControlError};
use mcp_compose_runtime::{EngineErrorKind, RuntimeError};

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] RuntimeError),

    /// `up` stopped at `failed`; everything in `started` was left running
    #[error("Failed to start '{failed}' (started: [{}]): {source}", started.join(", "))]
    PartialUp {
        started: Vec<String>,
        failed: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Service '{service}' did not report running within {waited:?}")]
    HealthTimeout { service: String, waited: Duration },

    #[error("Failed to stage build context for '{service}': {source}")]
    Staging {
        service: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ComposeResult<T> = Result<T, ComposeError>;

impl From<ComposeError> for ControlError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::Config(ConfigError::UnknownServer(name)) => Self::UnknownServer(name),
            ComposeError::Config(config) => Self::Config(config),
            ComposeError::Engine(e) if e.kind == EngineErrorKind::EngineAbsent => {
                Self::EngineAbsent
            }
            other => Self::Engine(other.to_string()),
        }
    }
}
