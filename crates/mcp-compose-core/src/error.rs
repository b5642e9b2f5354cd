//! Configuration errors
//!
//! Raised while loading or validating the manifest and environment. These are
//! fatal at startup (exit code 1).

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read manifest {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid server name '{name}': {reason}")]
    InvalidServerName { name: String, reason: &'static str },

    #[error("Server '{server}' has neither an image nor a build context")]
    MissingImage { server: String },

    #[error("Server '{server}' depends on undeclared server '{dependency}'")]
    UnknownDependency { server: String, dependency: String },

    #[error("Server name '{name}' is reserved by the enabled {service} service")]
    ReservedName { name: String, service: &'static str },

    #[error("Unknown server '{0}'")]
    UnknownServer(String),

    #[error("Dependency cycle involving server '{0}'")]
    DependencyCycle(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Missing required setting: {0}")]
    Missing(String),
}
