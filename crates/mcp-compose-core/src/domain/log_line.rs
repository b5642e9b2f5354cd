//! Container log lines as they are streamed to operators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of lines replayed when a log tail opens.
pub const DEFAULT_TAIL: usize = 50;

/// Tail value used when a requested tail is out of range.
pub const FALLBACK_TAIL: usize = 100;

/// Largest tail we forward to the engine.
pub const MAX_TAIL: usize = 10_000;

/// Level inferred from a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Infer a level by substring match, most severe first.
pub fn infer_level(line: &str) -> LogLevel {
    let upper = line.to_uppercase();
    if ["ERROR", "FATAL", "PANIC"].iter().any(|s| upper.contains(s)) {
        LogLevel::Error
    } else if upper.contains("WARN") {
        LogLevel::Warn
    } else if upper.contains("INFO") {
        LogLevel::Info
    } else if upper.contains("DEBUG") || upper.contains("TRACE") {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

/// Clamp a requested tail: absent means `default`, anything outside
/// `[1, 10000]` falls back to 100.
pub fn clamp_tail(requested: Option<i64>, default: usize) -> usize {
    match requested {
        None => default,
        Some(n) if n >= 1 && n <= MAX_TAIL as i64 => n as usize,
        Some(_) => FALLBACK_TAIL,
    }
}

/// Split an engine line of the form `<RFC3339-nano> <content>`.
///
/// Returns `None` for the timestamp when the first token does not parse.
pub fn split_timestamp(line: &str) -> (Option<&str>, &str) {
    if let Some((head, rest)) = line.split_once(' ') {
        if DateTime::parse_from_rfc3339(head).is_ok() {
            return (Some(head), rest);
        }
    }
    (None, line)
}

/// One framed log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub server: String,
    pub level: LogLevel,
    pub message: String,
    /// Engine timestamp prefix, when the line carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_timestamp: Option<String>,
}

impl LogLine {
    /// Wrap a raw line read from a follow stream.
    pub fn from_raw(server: impl Into<String>, raw: &str) -> Self {
        let message = raw.trim_end_matches(['\r', '\n']).to_string();
        Self {
            timestamp: Utc::now(),
            server: server.into(),
            level: infer_level(&message),
            message,
            original_timestamp: None,
        }
    }

    /// Parse a line that may be prefixed with an engine timestamp; the level
    /// is inferred from the content only.
    pub fn parse_timestamped(server: impl Into<String>, raw: &str) -> Self {
        let raw = raw.trim_end_matches(['\r', '\n']);
        let (ts, content) = split_timestamp(raw);
        let timestamp = ts
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        Self {
            timestamp,
            server: server.into(),
            level: infer_level(content),
            message: content.to_string(),
            original_timestamp: ts.map(str::to_string),
        }
    }
}
