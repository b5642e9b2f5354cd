//! Proxy HTTP handlers

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::to_bytes,
    extract::{ConnectInfo, Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::{DateTime, Utc};
use mcp_compose_core::{
    branding, clamp_tail, kinds, ActivityEvent, LogLine, Protocol, DEFAULT_TAIL,
};
use futures::StreamExt;
use mcp_compose_mcp::{ensure_params, UpstreamError};
use mcp_compose_runtime::{LogEvent, LogOptions};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::proxy::upstream::{http_base_url, Upstream};
use crate::proxy::{passthrough, upstream_failure, ProxyState};
use crate::streaming::sse::log_event_stream;

/// Largest JSON-RPC body accepted from a client
const MAX_RPC_BODY: usize = 4 * 1024 * 1024;

/// Header identifying the calling client for `/api/connections`
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// MCP headers forwarded in both directions
const MCP_HEADERS: &[&str] = &["mcp-session-id", "mcp-protocol-version"];

/// Container name for a path segment that may be a server name or already
/// the canonical container name.
pub fn container_for(name: &str) -> String {
    if branding::server_from_container(name).is_some() {
        name.to_string()
    } else {
        branding::container_name(name)
    }
}

fn server_for(container: &str) -> String {
    branding::server_from_container(container)
        .unwrap_or(container)
        .to_string()
}

pub async fn health(State(state): State<ProxyState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "engine": state.runtime.engine(),
        "uptimeSecs": state.uptime_secs(),
    }))
}

/// `GET|HEAD /api/servers`
pub async fn list_servers(State(state): State<ProxyState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.discover().await?))
}

/// `GET /api/status`
pub async fn status(State(state): State<ProxyState>) -> ApiResult<Json<Value>> {
    let servers = state.discover().await?;
    let running = servers.values().filter(|s| s.status == "running").count();
    Ok(Json(json!({
        "status": "running",
        "engine": state.runtime.engine(),
        "uptimeSecs": state.uptime_secs(),
        "startedAt": state.started_at,
        "serverCount": servers.len(),
        "runningServers": running,
        "servers": servers,
    })))
}

/// `GET /api/connections`
pub async fn connections(State(state): State<ProxyState>) -> impl IntoResponse {
    Json(state.connections.snapshot())
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub tail: Option<i64>,
    #[serde(default)]
    pub follow: bool,
    #[serde(default)]
    pub timestamps: bool,
    pub since: Option<String>,
}

impl LogsQuery {
    fn options(&self) -> LogOptions {
        LogOptions {
            follow: self.follow,
            tail: Some(clamp_tail(self.tail, DEFAULT_TAIL)),
            timestamps: self.timestamps,
            since: self.since.clone(),
        }
    }
}

/// `GET /api/containers/{name}/logs`: JSON array, or SSE with `follow=true`.
pub async fn container_logs(
    State(state): State<ProxyState>,
    Path(name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Response> {
    let container = container_for(&name);
    let server = server_for(&container);
    let options = query.options();

    if options.follow {
        debug!(container = %container, "[Proxy] Streaming logs over SSE");
        let stream = log_event_stream(state.runtime.clone(), container, server, options);
        let sse = Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)));
        return Ok(sse.into_response());
    }

    let mut stream = state.runtime.logs(&container, &options).await?;
    let mut lines = Vec::new();
    while let Some(event) = stream.next().await {
        match event {
            LogEvent::Line { text, .. } if options.timestamps => {
                lines.push(LogLine::parse_timestamped(&server, &text))
            }
            LogEvent::Line { text, .. } => lines.push(LogLine::from_raw(&server, &text)),
            LogEvent::Ended { .. } => break,
        }
    }
    Ok(Json(lines).into_response())
}

/// `GET /api/containers/{name}/stats`
pub async fn container_stats(
    State(state): State<ProxyState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let container = container_for(&name);
    Ok(Json(state.runtime.stats(&container).await?))
}

/// `POST /api/reload` and `POST /api/proxy/reload`
pub async fn reload(State(state): State<ProxyState>) -> ApiResult<Json<Value>> {
    info!("[Proxy] Reloading manifest");
    let summary = state.control.reload().await?;
    Ok(Json(json!({ "status": "reloaded", "summary": summary })))
}

#[derive(Debug, Deserialize)]
pub struct ServerActionBody {
    pub server: String,
}

/// `POST /api/servers/{start|stop|restart}`
pub async fn server_action(
    State(state): State<ProxyState>,
    Path(action): Path<String>,
    Json(body): Json<ServerActionBody>,
) -> ApiResult<Json<Value>> {
    let server = body.server;
    match action.as_str() {
        "start" => state.control.start_server(&server).await?,
        "stop" => state.control.stop_server(&server).await?,
        "restart" => state.control.restart_server(&server).await?,
        other => {
            return Err(ApiError::BadRequest(format!(
                "Unknown action '{}'; expected start, stop or restart",
                other
            )))
        }
    }
    info!(server = %server, "[Proxy] Server {} complete", action);
    Ok(Json(json!({ "status": "ok", "action": action, "server": server })))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
    pub since: Option<DateTime<Utc>>,
}

/// `GET /api/audit/activity`
pub async fn audit_activity(
    State(state): State<ProxyState>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Value>> {
    let store = state
        .store
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Activity store is not configured".into()))?;
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let events = store
        .recent(limit, query.since)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read activity: {:#}", e)))?;
    Ok(Json(json!({ "count": events.len(), "events": events })))
}

/// `GET /api/audit/stats`
pub async fn audit_stats(State(state): State<ProxyState>) -> ApiResult<Json<Value>> {
    let store = state
        .store
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Activity store is not configured".into()))?;
    let stats = store
        .stats()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read activity stats: {:#}", e)))?;
    Ok(Json(json!({
        "stats": stats,
        "connections": state.connections.snapshot(),
    })))
}

/// Base URL for an HTTP server's documentation endpoints.
async fn docs_base(state: &ProxyState, server: &str) -> ApiResult<String> {
    let manifest = state.control.manifest().await;
    let config = manifest
        .servers
        .get(server)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown server '{}'", server)))?;
    if config.protocol != Protocol::Http {
        return Err(ApiError::NotFound(format!(
            "Server '{}' does not serve HTTP documentation",
            server
        )));
    }
    http_base_url(server, config, state.config.upstream_host.as_deref())
        .ok_or_else(|| ApiError::NotFound(format!("Server '{}' declares no http_port", server)))
}

async fn fetch_doc(state: &ProxyState, server: &str, path: &str) -> ApiResult<Response> {
    let base = docs_base(state, server).await?;
    let response = state
        .http
        .get(format!("{}{}", base, path))
        .timeout(state.config.upstream_timeout)
        .send()
        .await
        .map_err(|e| upstream_failure(e, state.config.upstream_timeout))?;
    Ok(passthrough(response))
}

/// `GET /{server}/docs`
pub async fn server_docs(
    State(state): State<ProxyState>,
    Path(server): Path<String>,
) -> ApiResult<Response> {
    fetch_doc(&state, &server, "/docs").await
}

/// `GET /{server}/openapi.json`
pub async fn server_openapi(
    State(state): State<ProxyState>,
    Path(server): Path<String>,
) -> ApiResult<Response> {
    fetch_doc(&state, &server, "/openapi.json").await
}

/// Client identifier: `X-Client-Id` when present, else the remote address.
pub fn client_id(request: &Request) -> String {
    if let Some(id) = request
        .headers()
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return id.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `POST /{server}`: forward one JSON-RPC payload (or batch).
pub async fn forward_mcp(
    State(state): State<ProxyState>,
    Path(server): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let client = client_id(&request);
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_RPC_BODY)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {}", e)))?;
    let mut payload: Value = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON-RPC payload: {}", e)))?;
    ensure_params(&mut payload);

    let rpc_method = payload
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("batch")
        .to_string();

    let result = route(&state, &server, &parts.headers, &payload).await;

    let ok = matches!(&result, Ok(response) if !response.status().is_server_error());
    state.connections.record(&server, &client, ok);

    match &result {
        Ok(response) => state.publisher.publish(
            ActivityEvent::info(kinds::REQUEST, format!("{} → {}", rpc_method, server))
                .with_server(&server)
                .with_client(&client)
                .with_detail("method", rpc_method.as_str())
                .with_detail("status", response.status().as_u16()),
        ),
        Err(e) => {
            warn!(server = %server, method = %rpc_method, "[Proxy] Upstream call failed: {}", e);
            state.publisher.publish(
                ActivityEvent::error(kinds::ERROR, format!("{} → {} failed: {}", rpc_method, server, e))
                    .with_server(&server)
                    .with_client(&client)
                    .with_detail("method", rpc_method.as_str())
                    .with_detail("status", e.status().as_u16()),
            );
        }
    }

    result
}

async fn route(
    state: &ProxyState,
    server: &str,
    headers: &HeaderMap,
    payload: &Value,
) -> ApiResult<Response> {
    match state.resolve_upstream(server).await? {
        Upstream::Http { url } => forward_http(state, &url, headers, payload).await,
        Upstream::Stdio { container, command } => {
            match state.stdio.call(&container, &command, payload).await? {
                Some(response) => Ok(Json(response).into_response()),
                None => Ok(StatusCode::ACCEPTED.into_response()),
            }
        }
    }
}

async fn forward_http(
    state: &ProxyState,
    url: &str,
    headers: &HeaderMap,
    payload: &Value,
) -> ApiResult<Response> {
    let body = serde_json::to_vec(payload)
        .map_err(|e| ApiError::Internal(format!("Failed to encode payload: {}", e)))?;
    let accept = headers
        .get(header::ACCEPT)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json, text/event-stream"));

    let mut request = state
        .http
        .post(url)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, accept)
        .header(header::CONTENT_LENGTH, body.len())
        .body(body);
    for name in MCP_HEADERS {
        if let Some(value) = headers.get(*name) {
            request = request.header(*name, value.clone());
        }
    }

    let timeout = state.config.upstream_timeout;
    let response = match tokio::time::timeout(timeout, request.send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(upstream_failure(e, timeout)),
        Err(_) => return Err(ApiError::Upstream(UpstreamError::Timeout(timeout))),
    };
    debug!(url = %url, status = %response.status(), "[Proxy] Upstream responded");
    Ok(passthrough(response))
}
