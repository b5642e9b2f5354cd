//! Inspector session manager
//!
//! One session per (owner, server). A session caches the capabilities the
//! server returned from `initialize`; every `execute` touches it. Sessions
//! idle for longer than the TTL are treated as gone, and a sweeper removes
//! them periodically.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mcp_compose_core::branding;
use mcp_compose_core::domain::manifest::InspectorSection;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::RpcTransport;
use crate::error::{InspectorError, UpstreamError};
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

/// Timeouts for the session pool
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub request_timeout: Duration,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&InspectorSection::default())
    }
}

impl From<&InspectorSection> for SessionConfig {
    fn from(section: &InspectorSection) -> Self {
        Self {
            request_timeout: Duration::from_secs(section.timeout_secs),
            idle_timeout: Duration::from_secs(section.idle_timeout_secs),
            sweep_interval: Duration::from_secs(section.sweep_interval_secs.max(1)),
        }
    }
}

struct InspectorSession {
    id: String,
    server: String,
    owner: Option<String>,
    created_at: DateTime<Utc>,
    last_used: parking_lot::Mutex<Instant>,
    capabilities: Value,
    server_info: Value,
    /// One in-flight request per session
    inflight: Mutex<()>,
}

impl InspectorSession {
    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    fn idle(&self) -> Duration {
        self.last_used.lock().elapsed()
    }

    fn connect_result(&self) -> ConnectResult {
        ConnectResult {
            session_id: self.id.clone(),
            capabilities: self.capabilities.clone(),
            server_info: self.server_info.clone(),
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            server: self.server.clone(),
            owner: self.owner.clone(),
            created_at: self.created_at,
            idle_secs: self.idle().as_secs(),
            capabilities: self.capabilities.clone(),
        }
    }
}

/// Result of `connect`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResult {
    pub session_id: String,
    pub capabilities: Value,
    pub server_info: Value,
}

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub idle_secs: u64,
    pub capabilities: Value,
}

#[derive(Default)]
struct SessionTable {
    sessions: HashMap<String, Arc<InspectorSession>>,
    by_owner: HashMap<(String, String), String>,
}

impl SessionTable {
    /// The owner's session for `server`, if it has not gone idle.
    fn live_owned(
        &self,
        owner: &str,
        server: &str,
        idle_timeout: Duration,
    ) -> Option<Arc<InspectorSession>> {
        self.by_owner
            .get(&(owner.to_string(), server.to_string()))
            .and_then(|id| self.sessions.get(id))
            .filter(|session| session.idle() <= idle_timeout)
            .cloned()
    }

    fn remove(&mut self, id: &str) -> Option<Arc<InspectorSession>> {
        let session = self.sessions.remove(id)?;
        if let Some(owner) = &session.owner {
            let key = (owner.clone(), session.server.clone());
            if self.by_owner.get(&key).map(String::as_str) == Some(id) {
                self.by_owner.remove(&key);
            }
        }
        Some(session)
    }
}

/// Pool of inspector sessions
pub struct SessionManager {
    transport: Arc<dyn RpcTransport>,
    config: SessionConfig,
    table: RwLock<SessionTable>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn RpcTransport>, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            table: RwLock::new(SessionTable::default()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a session to `server`, or return the live one held by `owner`.
    pub async fn connect(&self, server: &str, owner: Option<&str>) -> ConnectResult {
        if let Some(owner) = owner {
            let table = self.table.read().await;
            if let Some(session) = table.live_owned(owner, server, self.config.idle_timeout) {
                session.touch();
                debug!(session_id = %session.id, server = %server, "[Inspector] Reusing session");
                return session.connect_result();
            }
        }

        let (capabilities, server_info) = match self.initialize(server).await {
            Ok(resp) => {
                let result = resp.result.unwrap_or(Value::Null);
                (
                    result.get("capabilities").cloned().unwrap_or_else(|| json!({})),
                    result.get("serverInfo").cloned().unwrap_or_else(|| json!({})),
                )
            }
            Err(e) => {
                warn!(server = %server, "[Inspector] initialize failed, continuing without capabilities: {}", e);
                (json!({}), json!({}))
            }
        };

        let session = Arc::new(InspectorSession {
            id: uuid::Uuid::new_v4().to_string(),
            server: server.to_string(),
            owner: owner.map(str::to_string),
            created_at: Utc::now(),
            last_used: parking_lot::Mutex::new(Instant::now()),
            capabilities: capabilities.clone(),
            server_info: server_info.clone(),
            inflight: Mutex::new(()),
        });

        let mut table = self.table.write().await;
        if let Some(owner) = owner {
            // A concurrent connect for the same owner may have won the race
            // while initialize was in flight.
            if let Some(session) = table.live_owned(owner, server, self.config.idle_timeout) {
                session.touch();
                debug!(session_id = %session.id, server = %server, "[Inspector] Reusing session created concurrently");
                return session.connect_result();
            }
            let key = (owner.to_string(), server.to_string());
            if let Some(previous) = table.by_owner.get(&key).cloned() {
                table.remove(&previous);
            }
            table.by_owner.insert(key, session.id.clone());
        }
        table.sessions.insert(session.id.clone(), session.clone());
        info!(session_id = %session.id, server = %server, "[Inspector] Session created");

        ConnectResult {
            session_id: session.id.clone(),
            capabilities,
            server_info,
        }
    }

    async fn initialize(&self, server: &str) -> Result<JsonRpcResponse, UpstreamError> {
        let request = JsonRpcRequest::new(
            "initialize",
            Some(json!({
                "protocolVersion": branding::MCP_PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": branding::MCP_CLIENT_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
        );
        self.send(server, &request).await
    }

    async fn send(
        &self,
        server: &str,
        request: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, UpstreamError> {
        match tokio::time::timeout(
            self.config.request_timeout,
            self.transport.call(server, request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.config.request_timeout)),
        }
    }

    async fn lookup(&self, session_id: &str) -> Result<Arc<InspectorSession>, InspectorError> {
        let session = {
            let table = self.table.read().await;
            table.sessions.get(session_id).cloned()
        };
        match session {
            Some(s) if s.idle() <= self.config.idle_timeout => Ok(s),
            Some(_) => {
                self.table.write().await.remove(session_id);
                debug!(session_id = %session_id, "[Inspector] Session expired on lookup");
                Err(InspectorError::SessionNotFound(session_id.to_string()))
            }
            None => Err(InspectorError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Run one JSON-RPC call on an existing session. The upstream's result
    /// or error is returned unchanged inside the response envelope.
    pub async fn execute(
        &self,
        session_id: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, InspectorError> {
        let session = self.lookup(session_id).await?;
        session.touch();

        let _inflight = session.inflight.lock().await;
        let request = JsonRpcRequest::new(method, params);
        debug!(session_id = %session_id, server = %session.server, method = %method, "[Inspector] execute");
        let response = self.send(&session.server, &request).await?;
        session.touch();
        Ok(response)
    }

    /// Remove a session. Returns whether it existed.
    pub async fn destroy(&self, session_id: &str) -> bool {
        let removed = self.table.write().await.remove(session_id).is_some();
        if removed {
            info!(session_id = %session_id, "[Inspector] Session destroyed");
        }
        removed
    }

    pub async fn list(&self) -> Vec<SessionInfo> {
        let table = self.table.read().await;
        let mut sessions: Vec<_> = table.sessions.values().map(|s| s.info()).collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove sessions idle for longer than `max_idle`.
    pub async fn cleanup(&self, max_idle: Duration) -> usize {
        let mut table = self.table.write().await;
        let expired: Vec<String> = table
            .sessions
            .values()
            .filter(|s| s.idle() > max_idle)
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            table.remove(id);
        }
        if !expired.is_empty() {
            info!("[Inspector] Cleaned up {} idle session(s)", expired.len());
        }
        expired.len()
    }

    /// Periodic cleanup until `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.sweep_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        manager.cleanup(manager.config.idle_timeout).await;
                    }
                }
            }
            debug!("[Inspector] Sweeper stopped");
        })
    }
}
