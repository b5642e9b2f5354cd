//! Process exit mapping: 0 success, 1 configuration error, 2 runtime error.

use mcp_compose_core::ConfigError;
use mcp_compose_orchestrator::ComposeError;
use mcp_compose_runtime::RuntimeError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 1,
            Self::Runtime(_) => 2,
        }
    }
}

impl From<ComposeError> for CliError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::Config(config) => Self::Config(config),
            other => Self::Runtime(other.into()),
        }
    }
}

impl From<RuntimeError> for CliError {
    fn from(err: RuntimeError) -> Self {
        Self::Runtime(err.into())
    }
}

pub type CliResult<T> = Result<T, CliError>;
