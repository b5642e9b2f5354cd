//! Interactive exec sessions inside running containers

use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tracing::debug;

/// Piped stdin/stdout of a process running inside a container.
pub struct ExecSession {
    pub stdin: Pin<Box<dyn AsyncWrite + Send>>,
    pub stdout: Pin<Box<dyn AsyncRead + Send>>,
    pub handle: ExecHandle,
}

/// Owner of the exec child. Dropping it kills the child.
pub struct ExecHandle {
    child: Option<Child>,
}

impl ExecHandle {
    pub fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    /// Handle with no local child (in-memory sessions).
    pub fn detached() -> Self {
        Self { child: None }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Whether the child is still running.
    pub fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                debug!("[Exec] kill failed: {}", e);
            }
        }
    }
}

impl ExecSession {
    /// Session over arbitrary streams.
    pub fn from_streams(
        stdin: impl AsyncWrite + Send + 'static,
        stdout: impl AsyncRead + Send + 'static,
    ) -> Self {
        Self {
            stdin: Box::pin(stdin),
            stdout: Box::pin(stdout),
            handle: ExecHandle::detached(),
        }
    }
}
