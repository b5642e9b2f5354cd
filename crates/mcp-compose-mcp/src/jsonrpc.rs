//! JSON-RPC 2.0 envelope.
//!
//! `params` is always serialized as an object: several MCP servers reject
//! requests where it is missing or null.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(0);

/// Time-derived request id: unix millis followed by a per-process sequence.
pub fn next_request_id() -> u64 {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let seq = REQUEST_SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
    millis * 1000 + seq
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Value::from(next_request_id()),
            method: method.into(),
            params: normalize(params),
        }
    }

    /// `tools/call` with the given tool name and arguments.
    pub fn tool_call(tool: &str, arguments: Value) -> Self {
        Self::new(
            "tools/call",
            Some(serde_json::json!({ "name": tool, "arguments": arguments })),
        )
    }
}

fn normalize(params: Option<Value>) -> Value {
    match params {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(other) => other,
    }
}

/// Fill in `params: {}` on a raw request payload (or each entry of a batch).
pub fn ensure_params(payload: &mut Value) {
    match payload {
        Value::Object(obj) if obj.contains_key("method") => {
            let missing = matches!(obj.get("params"), None | Some(Value::Null));
            if missing {
                obj.insert("params".to_string(), Value::Object(Map::new()));
            }
        }
        Value::Array(batch) => batch.iter_mut().for_each(ensure_params),
        _ => {}
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

fn default_version() -> String {
    "2.0".to_string()
}

impl JsonRpcResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
