//! Task scheduler REST shim
//!
//! Translates the scheduler's REST endpoints into `tools/call` on the
//! `task-scheduler` server. Each call uses a short-lived session that is
//! destroyed afterwards.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::error::InspectorError;
use crate::jsonrpc::JsonRpcResponse;
use crate::session::SessionManager;

/// Server name the shim targets.
pub const TASK_SCHEDULER_SERVER: &str = "task-scheduler";

/// A recognized scheduler endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerRoute {
    pub tool: &'static str,
    pub arguments: Value,
}

impl SchedulerRoute {
    /// Map `(method, path)` to a tool call. `path` is relative to the shim
    /// mount point, e.g. `/tasks/abc/run`.
    pub fn resolve(method: &str, path: &str, body: Option<Value>) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let method = method.to_ascii_uppercase();

        let (tool, arguments) = match (method.as_str(), segments.as_slice()) {
            ("GET", ["tasks"]) => ("list_tasks", json!({})),
            ("POST", ["tasks"]) => ("add_task", body.unwrap_or_else(|| json!({}))),
            ("POST", ["tasks", id, "run"]) => ("run_task", json!({ "id": id })),
            ("POST", ["tasks", id, "enable"]) => ("enable_task", json!({ "id": id })),
            ("POST", ["tasks", id, "disable"]) => ("disable_task", json!({ "id": id })),
            ("GET", ["tasks", id, "output"]) => ("get_run_output", json!({ "task_id": id })),
            ("GET", ["runs", "status"]) => ("list_run_status", json!({})),
            ("GET", ["metrics"]) => ("get_metrics", json!({})),
            _ => return None,
        };
        Some(Self { tool, arguments })
    }
}

/// Pull the tool output out of a `tools/call` result.
///
/// The text of `content[0]` is re-parsed as JSON when possible; otherwise
/// the raw result object is returned.
pub fn unwrap_tool_result(result: Value) -> Value {
    let parsed = result
        .get("content")
        .and_then(|c| c.get(0))
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str)
        .and_then(|text| serde_json::from_str::<Value>(text).ok());
    parsed.unwrap_or(result)
}

pub struct SchedulerDispatcher {
    sessions: Arc<SessionManager>,
    server: String,
}

impl SchedulerDispatcher {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            server: TASK_SCHEDULER_SERVER.to_string(),
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub async fn dispatch(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, InspectorError> {
        let route = SchedulerRoute::resolve(method, path, body).ok_or_else(|| {
            InspectorError::UnknownRoute {
                method: method.to_string(),
                path: path.to_string(),
            }
        })?;
        debug!(tool = %route.tool, "[Scheduler] {} {}", method, path);

        let session = self.sessions.connect(&self.server, None).await;
        let params = json!({ "name": route.tool, "arguments": route.arguments });
        let outcome = self
            .sessions
            .execute(&session.session_id, "tools/call", Some(params))
            .await;
        self.sessions.destroy(&session.session_id).await;

        into_value(outcome?)
    }
}

fn into_value(response: JsonRpcResponse) -> Result<Value, InspectorError> {
    if let Some(error) = response.error {
        return Err(InspectorError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    Ok(unwrap_tool_result(response.result.unwrap_or(Value::Null)))
}
