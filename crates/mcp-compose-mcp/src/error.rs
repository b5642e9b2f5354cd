//! Errors raised while talking to MCP servers.

use std::time::Duration;

/// Failure talking to an upstream MCP server or authorization server.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream returned HTTP {status}")]
    BadStatus { status: u16, body: String },

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

/// Inspector session failures.
#[derive(Debug, thiserror::Error)]
pub enum InspectorError {
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("no scheduler route for {method} {path}")]
    UnknownRoute { method: String, path: String },

    #[error("{message} (code {code})")]
    Rpc { code: i64, message: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
