//! Dashboard HTTP and WebSocket handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ws::WebSocketUpgrade, Path, Query, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use minijinja::context;
use mcp_compose_core::{
    branding, clamp_tail, kinds, validate_server_name, ActivityEvent, DEFAULT_TAIL,
};
use mcp_compose_mcp::{ConnectResult, JsonRpcResponse, SessionInfo};
use mcp_compose_runtime::LogOptions;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::DashboardState;
use crate::error::{ApiError, ApiResult};
use crate::streaming::activity::serve_activity_socket;
use crate::streaming::logs::{runtime_feed, serve_log_socket, LogFeed, LogsSocketQuery};
use crate::streaming::metrics::{serve_metrics_socket, MetricsSource};
use crate::templates;

/// Header naming the operator that owns inspector sessions
const OWNER_HEADER: &str = "x-client-id";

pub fn render_index(
    title: &str,
    theme: &str,
    proxy_url: &str,
    servers: &[String],
) -> Result<String, minijinja::Error> {
    templates::render(
        templates::DASHBOARD,
        context! { title, theme, proxy_url, servers },
    )
}

pub async fn index(State(state): State<DashboardState>) -> ApiResult<Html<String>> {
    let config = &state.config;
    render_index(&config.title, &config.theme, &config.proxy_url, &config.servers)
        .map(Html)
        .map_err(|e| ApiError::Internal(format!("index page: {}", e)))
}

pub async fn health(State(state): State<DashboardState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "engine": state.runtime.engine(),
        "sessions": state.sessions.len().await,
        "activityBus": state.publisher.bus().is_some(),
    }))
}

/// Open the follow feed for one server: the proxy's SSE endpoint first,
/// the engine CLI directly when the proxy cannot serve it.
async fn open_log_feed(state: &DashboardState, server: &str, tail: usize) -> Result<LogFeed, String> {
    let container = branding::container_name(server);
    match state.proxy.log_feed(&container, server, tail).await {
        Ok(feed) => return Ok(feed),
        Err(e) => debug!(server = %server, "[Dashboard] Proxy log stream unavailable, using engine: {}", e),
    }
    state
        .runtime
        .logs(&container, &LogOptions::follow(tail))
        .await
        .map(|stream| runtime_feed(stream, server.to_string()))
        .map_err(|e| format!("failed to open log stream: {}", e))
}

/// `GET /ws/logs?server=<name>&tail=<n>`
pub async fn ws_logs(
    ws: WebSocketUpgrade,
    State(state): State<DashboardState>,
    Query(query): Query<LogsSocketQuery>,
) -> ApiResult<Response> {
    let server = query
        .server
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'server' query parameter".into()))?;
    validate_server_name(&server)?;
    let tail = clamp_tail(query.tail, DEFAULT_TAIL);

    Ok(ws.on_upgrade(move |socket| async move {
        info!(server = %server, tail, "[Dashboard] Log stream opened");
        let feed = open_log_feed(&state, &server, tail).await;
        serve_log_socket(socket, server, feed).await;
    }))
}

/// `GET /ws/metrics`
pub async fn ws_metrics(ws: WebSocketUpgrade, State(state): State<DashboardState>) -> Response {
    let source: Arc<dyn MetricsSource> = Arc::new(state.proxy.clone());
    ws.on_upgrade(move |socket| serve_metrics_socket(socket, source))
}

/// `GET /ws/activity`
pub async fn ws_activity(ws: WebSocketUpgrade, State(state): State<DashboardState>) -> Response {
    let bus = state.publisher.bus().cloned();
    ws.on_upgrade(move |socket| serve_activity_socket(socket, bus))
}

fn owner(headers: &HeaderMap) -> Option<String> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
pub struct ConnectBody {
    pub server: String,
}

/// `POST /api/inspector/connect`
pub async fn inspector_connect(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    Json(body): Json<ConnectBody>,
) -> ApiResult<Json<ConnectResult>> {
    validate_server_name(&body.server)?;
    let owner = owner(&headers);
    let result = state.sessions.connect(&body.server, owner.as_deref()).await;
    state.publisher.publish(
        ActivityEvent::info(kinds::CONNECTION, format!("Inspector connected to {}", body.server))
            .with_server(&body.server)
            .with_detail("sessionId", result.session_id.as_str()),
    );
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub session_id: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// `POST /api/inspector/request`
pub async fn inspector_request(
    State(state): State<DashboardState>,
    Json(body): Json<RequestBody>,
) -> ApiResult<Json<JsonRpcResponse>> {
    let response = state
        .sessions
        .execute(&body.session_id, &body.method, body.params)
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectBody {
    pub session_id: String,
}

/// `POST /api/inspector/disconnect`
pub async fn inspector_disconnect(
    State(state): State<DashboardState>,
    Json(body): Json<DisconnectBody>,
) -> ApiResult<Json<Value>> {
    if !state.sessions.destroy(&body.session_id).await {
        return Err(ApiError::NotFound(format!(
            "Session '{}' not found",
            body.session_id
        )));
    }
    Ok(Json(json!({ "status": "disconnected", "sessionId": body.session_id })))
}

/// `GET /api/inspector/sessions`
pub async fn inspector_sessions(State(state): State<DashboardState>) -> Json<Vec<SessionInfo>> {
    Json(state.sessions.list().await)
}

/// `ANY /api/task-scheduler/{*path}`
pub async fn task_scheduler(
    State(state): State<DashboardState>,
    method: Method,
    Path(path): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = if body.is_empty() {
        None
    } else {
        Some(
            serde_json::from_slice::<Value>(&body)
                .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?,
        )
    };
    let path = format!("/{}", path.trim_start_matches('/'));
    let value = state.scheduler.dispatch(method.as_str(), &path, body).await?;
    Ok(Json(value))
}

/// Point documentation assets back through the dashboard.
pub fn rewrite_doc_links(html: &str, server: &str) -> String {
    let openapi = format!("/api/server-docs/{}/openapi.json", server);
    html.replace("\"/openapi.json\"", &format!("\"{}\"", openapi))
        .replace("'/openapi.json'", &format!("'{}'", openapi))
        .replace("href=\"/docs\"", &format!("href=\"/api/server-docs/{}\"", server))
}

/// `GET /api/server-docs/{server}`
pub async fn server_docs(
    State(state): State<DashboardState>,
    Path(server): Path<String>,
) -> ApiResult<Response> {
    validate_server_name(&server)?;
    let (content_type, body) = state
        .proxy
        .get_text(&format!("/{}/docs", server))
        .await
        .map_err(not_found_passthrough)?;
    let is_html = content_type
        .as_deref()
        .map_or(true, |ct| ct.starts_with("text/html"));
    if is_html {
        return Ok(Html(rewrite_doc_links(&body, &server)).into_response());
    }
    let content_type = content_type.unwrap_or_else(|| "text/plain".to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

/// `GET /api/server-docs/{server}/openapi.json`
pub async fn server_openapi(
    State(state): State<DashboardState>,
    Path(server): Path<String>,
) -> ApiResult<Response> {
    validate_server_name(&server)?;
    state
        .proxy
        .forward(Method::GET, &format!("/{}/openapi.json", server), None, Bytes::new())
        .await
}

fn not_found_passthrough(err: mcp_compose_mcp::UpstreamError) -> ApiError {
    match err {
        mcp_compose_mcp::UpstreamError::BadStatus { status: 404, body } => ApiError::NotFound(body),
        other => ApiError::Upstream(other),
    }
}

/// `POST /api/activity`: cross-process intake into the local bus.
pub async fn activity_intake(
    State(state): State<DashboardState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let bus = state
        .publisher
        .bus()
        .ok_or_else(|| ApiError::Unavailable("No activity bus in this process".into()))?;
    let event: ActivityEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid activity event: {}", e)))?;
    let id = event.id.clone();
    bus.publish(event);
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted", "id": id }))))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub since: Option<DateTime<Utc>>,
}

/// `GET /api/activity/history`
pub async fn activity_history(
    State(state): State<DashboardState>,
    Query(query): Query<HistoryQuery>,
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

/// `GET /api/activity/stats`
pub async fn activity_stats(State(state): State<DashboardState>) -> ApiResult<Json<Value>> {
    let stored = match &state.store {
        Some(store) => Some(
            store
                .stats()
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to read activity stats: {:#}", e)))?,
        ),
        None => None,
    };
    let live = state.publisher.bus().map(|bus| bus.counters());
    if stored.is_none() && live.is_none() {
        return Err(ApiError::Unavailable("Activity is not enabled".into()));
    }
    Ok(Json(json!({ "stored": stored, "live": live })))
}

/// `ANY /api/{*rest}`: forwarded to the proxy with bearer auth.
pub async fn api_passthrough(
    State(state): State<DashboardState>,
    method: Method,
    Path(rest): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let mut path = format!("/api/{}", rest.trim_start_matches('/'));
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        path.push('?');
        path.push_str(&query);
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    state.proxy.forward(method, &path, content_type, body).await
}
