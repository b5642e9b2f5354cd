//! JSON-RPC over stdio for servers that do not speak HTTP.
//!
//! One `exec -i` child per server, kept open across requests. Requests are
//! written as one JSON document per line; lines read back are matched to the
//! request ids. Only one request is in flight per server. A bridge that
//! errors or times out is dropped and re-created on the next call.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use mcp_compose_mcp::UpstreamError;
use mcp_compose_runtime::{ContainerRuntime, ExecHandle};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};

/// Deadline for a stdio server to answer one request
pub const STDIO_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

struct Bridge {
    stdin: Pin<Box<dyn AsyncWrite + Send>>,
    lines: Lines<BufReader<Pin<Box<dyn AsyncRead + Send>>>>,
    handle: ExecHandle,
}

impl Bridge {
    async fn write(&mut self, payload: &Value) -> std::io::Result<()> {
        let mut line = serde_json::to_string(payload)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await
    }

    /// Read lines until every id in `pending` has a response. Non-JSON
    /// lines and unrelated messages are skipped.
    async fn read_responses(&mut self, mut pending: Vec<Value>) -> Result<Vec<Value>, UpstreamError> {
        let mut responses = Vec::new();
        while !pending.is_empty() {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| UpstreamError::Unreachable(e.to_string()))?
                .ok_or_else(|| UpstreamError::Unreachable("stdio server closed its output".into()))?;

            let Ok(message) = serde_json::from_str::<Value>(line.trim()) else {
                debug!("[StdioBridge] Skipping non-JSON line: {}", line);
                continue;
            };
            let is_response = message.get("result").is_some() || message.get("error").is_some();
            let id = message.get("id").cloned().unwrap_or(Value::Null);
            if let Some(pos) = pending.iter().position(|p| *p == id) {
                if is_response {
                    pending.remove(pos);
                    responses.push(message);
                }
            }
        }
        Ok(responses)
    }
}

/// Ids of the requests in a payload that expect a response.
pub fn expected_ids(payload: &Value) -> Vec<Value> {
    let entries: Vec<&Value> = match payload {
        Value::Array(batch) => batch.iter().collect(),
        other => vec![other],
    };
    entries
        .into_iter()
        .filter_map(|e| e.get("id").filter(|id| !id.is_null()).cloned())
        .collect()
}

pub struct StdioBridgePool {
    runtime: Arc<dyn ContainerRuntime>,
    bridges: Mutex<HashMap<String, Arc<Mutex<Option<Bridge>>>>>,
    timeout: Duration,
}

impl StdioBridgePool {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            bridges: Mutex::new(HashMap::new()),
            timeout: STDIO_RESPONSE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn slot(&self, container: &str) -> Arc<Mutex<Option<Bridge>>> {
        let mut bridges = self.bridges.lock().await;
        bridges
            .entry(container.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Send a request (or batch). Returns `None` for pure notifications.
    pub async fn call(
        &self,
        container: &str,
        command: &[String],
        payload: &Value,
    ) -> ApiResult<Option<Value>> {
        let slot = self.slot(container).await;
        let mut guard = slot.lock().await;

        if guard.is_none() {
            let session = self.runtime.exec(container, command, true).await?;
            info!(container = %container, "[StdioBridge] Opened exec session");
            *guard = Some(Bridge {
                stdin: session.stdin,
                lines: BufReader::new(session.stdout).lines(),
                handle: session.handle,
            });
        }

        let outcome = match guard.as_mut() {
            Some(bridge) => self.exchange(bridge, payload).await,
            None => Err(UpstreamError::Unreachable("stdio bridge unavailable".into())),
        };

        match outcome {
            Ok(responses) => Ok(shape_response(payload, responses)),
            Err(e) => {
                warn!(container = %container, "[StdioBridge] Dropping bridge: {}", e);
                if let Some(mut bridge) = guard.take() {
                    bridge.handle.kill().await;
                }
                Err(ApiError::Upstream(e))
            }
        }
    }

    async fn exchange(&self, bridge: &mut Bridge, payload: &Value) -> Result<Vec<Value>, UpstreamError> {
        bridge
            .write(payload)
            .await
            .map_err(|e| UpstreamError::Unreachable(e.to_string()))?;

        let pending = expected_ids(payload);
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        match tokio::time::timeout(self.timeout, bridge.read_responses(pending)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.timeout)),
        }
    }

    /// Close every bridge.
    pub async fn shutdown(&self) {
        let bridges: Vec<_> = self.bridges.lock().await.drain().collect();
        for (container, slot) in bridges {
            if let Some(mut bridge) = slot.lock().await.take() {
                bridge.handle.kill().await;
                debug!(container = %container, "[StdioBridge] Closed");
            }
        }
    }
}

fn shape_response(payload: &Value, mut responses: Vec<Value>) -> Option<Value> {
    if responses.is_empty() {
        return None;
    }
    if payload.is_array() {
        Some(Value::Array(responses))
    } else {
        responses.pop()
    }
}
