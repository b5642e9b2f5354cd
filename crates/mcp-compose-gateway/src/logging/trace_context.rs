//! Trace ids and per-request log lines.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, info_span, warn, Span};

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Short unique id for one request: 6 hex characters.
pub fn generate_trace_id() -> String {
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let micros = chrono::Utc::now().timestamp_micros().max(0) as u64;
    format!("{:06x}", counter.wrapping_mul(0x9e37).wrapping_add(micros) & 0xFF_FFFF)
}

/// Correlation data for a single request
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub method: String,
    pub path: String,
    /// JSON-RPC method when the body carried one
    pub rpc_method: Option<String>,
    /// Target server for proxied JSON-RPC
    pub server: Option<String>,
    pub started_at: Instant,
}

impl TraceContext {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            trace_id: generate_trace_id(),
            method: method.to_string(),
            path: path.to_string(),
            rpc_method: None,
            server: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_rpc_method(mut self, method: Option<String>) -> Self {
        self.rpc_method = method;
        self
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

pub struct RequestSpan;

impl RequestSpan {
    pub fn enter(ctx: &TraceContext) -> Span {
        info_span!("request", trace_id = %ctx.trace_id)
    }

    /// `→ METHOD PATH [rpc-method]`
    pub fn log_entry(ctx: &TraceContext) {
        match &ctx.rpc_method {
            Some(rpc) => info!(trace_id = %ctx.trace_id, "→ {} {} [{}]", ctx.method, ctx.path, rpc),
            None => info!(trace_id = %ctx.trace_id, "→ {} {}", ctx.method, ctx.path),
        }
    }

    /// `← STATUS (Nms)`; server errors log at warn.
    pub fn log_exit(ctx: &TraceContext, status: u16) {
        let elapsed = ctx.elapsed_ms();
        if status >= 500 {
            warn!(trace_id = %ctx.trace_id, "← {} ({}ms)", status, elapsed);
        } else {
            info!(trace_id = %ctx.trace_id, "← {} ({}ms)", status, elapsed);
        }
    }
}
