//! Bearer token policy
//!
//! A single API key guards every non-public endpoint. The key is kept only
//! as a SHA-256 digest and compared digest-to-digest. WebSocket clients that
//! cannot set headers may pass the key as `?token=`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ApiError;

/// Paths reachable without a token
const PUBLIC_PATHS: &[&str] = &["/", "/health"];

/// Prefixes reachable without a token (RFC 6749 endpoints and metadata)
const PUBLIC_PREFIXES: &[&str] = &["/oauth/", "/.well-known/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    Missing,
    #[error("Invalid bearer token")]
    Invalid,
}

/// API key check. `None` disables auth.
#[derive(Clone, Default)]
pub struct BearerPolicy {
    digest: Option<[u8; 32]>,
}

impl std::fmt::Debug for BearerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerPolicy")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

impl BearerPolicy {
    pub fn new(api_key: Option<&str>) -> Self {
        Self {
            digest: api_key.filter(|k| !k.is_empty()).map(digest),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.digest.is_some()
    }

    pub fn is_public(path: &str) -> bool {
        PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
    }

    /// Validate the `Authorization: Bearer` header, falling back to a
    /// `token` query parameter.
    pub fn check(&self, headers: &HeaderMap, query: Option<&str>) -> Result<(), AuthError> {
        let Some(expected) = &self.digest else {
            return Ok(());
        };

        let presented = bearer_from_headers(headers).or_else(|| query.and_then(token_from_query));
        match presented {
            None => Err(AuthError::Missing),
            Some(token) if &digest(&token) == expected => Ok(()),
            Some(_) => Err(AuthError::Invalid),
        }
    }
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim().to_string())
}

fn token_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
}

/// Reject protected requests without a valid token. No handler runs for a
/// rejected request.
pub async fn require_bearer(
    State(policy): State<Arc<BearerPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if BearerPolicy::is_public(path) {
        return next.run(request).await;
    }

    match policy.check(request.headers(), request.uri().query()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            debug!(path = %path, "[Auth] Rejected: {}", e);
            ApiError::Auth(e).into_response()
        }
    }
}
