//! Fixed-window rate limiting for the OAuth endpoints.
//!
//! Counts requests per path prefix; the proxy usually sits behind a single
//! address, so limits are per path rather than per client.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RateLimitRule {
    pub prefix: String,
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, (Instant, u32)>>,
    rules: Arc<Vec<RateLimitRule>>,
}

impl RateLimiter {
    pub fn new(rules: Vec<RateLimitRule>) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            rules: Arc::new(rules),
        }
    }

    /// Same limit on every `/oauth/*` endpoint.
    pub fn oauth(per_minute: u32) -> Self {
        let rules = ["/oauth/authorize", "/oauth/callback", "/oauth/token", "/oauth/register"]
            .into_iter()
            .map(|prefix| RateLimitRule {
                prefix: prefix.to_string(),
                max_requests: per_minute.max(1),
                window: Duration::from_secs(60),
            })
            .collect();
        Self::new(rules)
    }

    /// Whether a request to `path` is within limits; counts it if so.
    pub fn check(&self, path: &str) -> bool {
        let Some(rule) = self.rules.iter().find(|r| path.starts_with(&r.prefix)) else {
            return true;
        };

        let mut entry = self
            .buckets
            .entry(rule.prefix.clone())
            .or_insert_with(|| (Instant::now(), 0));
        let (window_start, count) = entry.value_mut();

        if window_start.elapsed() >= rule.window {
            *window_start = Instant::now();
            *count = 1;
            return true;
        }
        if *count >= rule.max_requests {
            return false;
        }
        *count += 1;
        true
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.check(request.uri().path()) {
        warn!(path = %request.uri().path(), "[RateLimit] Limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(json!({ "error": "Rate limit exceeded. Please try again later." })),
        )
            .into_response();
    }
    next.run(request).await
}
