//! HTTP request/response logging
//!
//! One entry and one exit line per request, tagged with a trace id. For
//! JSON-RPC posts the RPC method is pulled from the body. Bodies of
//! sensitive OAuth endpoints are never logged; neither is `authorization`.

use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use http_body_util::BodyExt;
use tracing::{debug, warn, Instrument};

use crate::logging::{RequestSpan, TraceContext};

/// Request bodies above this size are neither buffered for logging nor parsed
const MAX_BODY_LOG_SIZE: usize = 64 * 1024;

const SENSITIVE_PATHS: &[&str] = &["/oauth/token", "/oauth/register"];

/// Headers worth a debug line; `authorization` is deliberately absent
const LOGGED_HEADERS: &[&str] = &[
    "content-type",
    "accept",
    "user-agent",
    "x-client-id",
    "mcp-session-id",
    "mcp-protocol-version",
];

pub fn is_sensitive_path(path: &str) -> bool {
    SENSITIVE_PATHS.iter().any(|p| path.contains(p))
}

/// Streams whose bodies must not be buffered
fn is_streaming_path(path: &str) -> bool {
    path.starts_with("/ws/") || path.ends_with("/logs")
}

fn compact_headers(headers: &axum::http::HeaderMap) -> String {
    headers
        .iter()
        .filter(|(name, _)| LOGGED_HEADERS.contains(&name.as_str()))
        .map(|(name, value)| format!("{}={:?}", name, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compact body rendering for debug logs.
pub fn format_body(bytes: &[u8], redact: bool) -> String {
    if redact {
        return "[REDACTED]".to_string();
    }
    if bytes.is_empty() {
        return "[empty]".to_string();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(json) => serde_json::to_string(&json).unwrap_or_else(|_| text.to_string()),
            Err(_) if text.chars().count() > 200 => {
                format!("{}...", text.chars().take(200).collect::<String>())
            }
            Err(_) => text.to_string(),
        },
        Err(_) => format!("[binary: {} bytes]", bytes.len()),
    }
}

/// JSON-RPC method of a request body (first entry of a batch).
pub fn extract_rpc_method(bytes: &[u8]) -> Option<String> {
    let json: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    let first = match &json {
        serde_json::Value::Array(batch) => batch.first()?,
        other => other,
    };
    first.get("method").and_then(|m| m.as_str()).map(String::from)
}

pub async fn http_logging_middleware(request: Request, next: Next) -> Result<Response, StatusCode> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let mut ctx = TraceContext::new(&method, &path);
    let span = RequestSpan::enter(&ctx);

    async move {
        debug!(
            trace_id = %ctx.trace_id,
            headers = %compact_headers(request.headers()),
            "Request headers"
        );

        let buffer_body = !is_streaming_path(&path)
            && request
                .headers()
                .get(axum::http::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok())
                .map_or(true, |len| len <= MAX_BODY_LOG_SIZE);

        let request = if buffer_body {
            let (parts, body) = request.into_parts();
            let bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    warn!(trace_id = %ctx.trace_id, "Failed to read request body: {}", e);
                    return Err(StatusCode::BAD_REQUEST);
                }
            };
            if !bytes.is_empty() {
                if method == "POST" {
                    ctx = ctx.with_rpc_method(extract_rpc_method(&bytes));
                }
                debug!(
                    trace_id = %ctx.trace_id,
                    body = %format_body(&bytes, is_sensitive_path(&path)),
                    "Request body"
                );
            }
            Request::from_parts(parts, Body::from(bytes))
        } else {
            request
        };

        RequestSpan::log_entry(&ctx);
        let mut request = request;
        request.extensions_mut().insert(ctx.clone());

        let response = next.run(request).await;
        RequestSpan::log_exit(&ctx, response.status().as_u16());
        Ok(response)
    }
    .instrument(span)
    .await
}
