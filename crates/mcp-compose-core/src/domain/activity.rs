//! Activity events
//!
//! Observability records produced by any component and fanned out by the
//! [`ActivityBus`](crate::event_bus::ActivityBus). Events are immutable once
//! published.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known event kinds. Kinds are open strings; these are the ones we emit.
pub mod kinds {
    pub const REQUEST: &str = "request";
    pub const CONNECTION: &str = "connection";
    pub const TOOL: &str = "tool";
    pub const ERROR: &str = "error";
    pub const SERVICE: &str = "service";
    pub const NETWORK: &str = "network";
    pub const SYSTEM: &str = "system";
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARN" | "WARNING" => Some(Self::Warn),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single activity record.
///
/// Intake payloads may omit `id` and `timestamp`; both are filled in on
/// deserialization. `type` and `level` are accepted as aliases so that
/// older dashboard builds can still post events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Time-ordered unique id (UUID v7)
    #[serde(default = "new_event_id")]
    pub id: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default, alias = "level")]
    pub severity: Severity,

    #[serde(alias = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
}

fn new_event_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

impl ActivityEvent {
    pub fn new(severity: Severity, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: new_event_id(),
            timestamp: Utc::now(),
            severity,
            kind: kind.into(),
            server: None,
            client: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn info(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, kind, message)
    }

    pub fn warn(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, kind, message)
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, kind, message)
    }

    /// Synthetic event sent to a freshly registered subscriber.
    pub fn welcome(subscriber_index: u64) -> Self {
        Self::info(kinds::CONNECTION, "Connected to activity stream")
            .with_detail("subscriberIndex", subscriber_index)
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Details serialized as a JSON string for storage.
    pub fn details_json(&self) -> Option<String> {
        self.details
            .as_ref()
            .and_then(|d| serde_json::to_string(d).ok())
    }
}
