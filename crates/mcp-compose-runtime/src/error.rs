//! Runtime driver errors

use std::fmt;

/// Failure category reported by a runtime driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    /// No container engine is installed or reachable
    EngineAbsent,
    /// Resource in use (e.g. a network with attached containers)
    Busy,
    NotFound,
    BuildFailed,
    PullFailed,
    StartFailed,
    StopFailed,
    InspectFailed,
    NetworkFailed,
    ExecFailed,
    /// The engine command exceeded its deadline
    Timeout,
}

impl EngineErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EngineAbsent => "engine-absent",
            Self::Busy => "busy",
            Self::NotFound => "not-found",
            Self::BuildFailed => "build-failed",
            Self::PullFailed => "pull-failed",
            Self::StartFailed => "start-failed",
            Self::StopFailed => "stop-failed",
            Self::InspectFailed => "inspect-failed",
            Self::NetworkFailed => "network-failed",
            Self::ExecFailed => "exec-failed",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured driver error: kind, message and the tail of the engine's stderr.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: EngineErrorKind,
    pub message: String,
    pub stderr_tail: Option<String>,
}

impl RuntimeError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stderr_tail: None,
        }
    }

    pub fn engine_absent() -> Self {
        Self::new(EngineErrorKind::EngineAbsent, "no container engine available")
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        if !stderr.trim().is_empty() {
            self.stderr_tail = Some(stderr);
        }
        self
    }

    pub fn is_engine_absent(&self) -> bool {
        self.kind == EngineErrorKind::EngineAbsent
    }

    /// Message with the stderr tail appended, for operator-facing output.
    pub fn detailed(&self) -> String {
        match &self.stderr_tail {
            Some(tail) => format!("{}\n{}", self, tail.trim_end()),
            None => self.to_string(),
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Last `n` lines of `text`.
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
