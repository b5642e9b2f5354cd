//! OAuth authorization-code mediation
//!
//! The proxy fronts a separate authorization server. It never mints or
//! stores tokens; it rewrites the authorize redirect so the browser lands on
//! our own `/oauth/callback`, and renders a local page with the code when
//! the authorization server cannot be reached.

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{Html, IntoResponse, Response},
};
use minijinja::context;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::proxy::{passthrough, upstream_failure, ProxyState};
use crate::templates;

/// Request headers forwarded to the authorization server
const FORWARDED_REQUEST_HEADERS: &[header::HeaderName] = &[
    header::CONTENT_TYPE,
    header::ACCEPT,
    header::AUTHORIZATION,
    header::COOKIE,
    header::USER_AGENT,
];

impl ProxyState {
    fn oauth_upstream(&self) -> ApiResult<&str> {
        self.config
            .oauth_upstream
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .ok_or_else(|| ApiError::NotFound("OAuth is not configured".to_string()))
    }
}

fn upstream_url(base: &str, path: &str, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(q) => format!("{}{}?{}", base, path, q),
        None => format!("{}{}", base, path),
    }
}

fn forward_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for name in FORWARDED_REQUEST_HEADERS {
        if let Some(value) = headers.get(name) {
            forwarded.insert(name.clone(), value.clone());
        }
    }
    forwarded
}

/// Where a redirect from the authorization server should send the browser.
///
/// A `Location` whose path contains `/oauth/callback` is rewritten to our own
/// callback with the same query; anything else passes through.
pub fn rewrite_authorize_location(location: &str, upstream: &str) -> String {
    let parsed = url::Url::parse(location)
        .or_else(|_| url::Url::parse(upstream).and_then(|base| base.join(location)));
    match parsed {
        Ok(url) if url.path().contains("/oauth/callback") => match url.query() {
            Some(q) => format!("/oauth/callback?{}", q),
            None => "/oauth/callback".to_string(),
        },
        _ => location.to_string(),
    }
}

/// `GET|POST /oauth/authorize`
pub async fn authorize(
    State(state): State<ProxyState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let base = state.oauth_upstream()?;
    let url = upstream_url(base, "/oauth/authorize", query.as_deref());

    let response = state
        .oauth_http
        .request(method, &url)
        .headers(forward_headers(&headers))
        .body(body)
        .send()
        .await
        .map_err(|e| upstream_failure(e, state.config.upstream_timeout))?;

    if response.status().is_redirection() {
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(location) = location {
            let target = rewrite_authorize_location(&location, base);
            let status = if target != location {
                info!("[OAuth] Redirecting browser to local callback");
                StatusCode::FOUND
            } else {
                response.status()
            };
            return Ok((status, [(header::LOCATION, target)]).into_response());
        }
    }

    Ok(passthrough(response))
}

/// `GET /oauth/callback`
pub async fn callback(State(state): State<ProxyState>, RawQuery(query): RawQuery) -> Response {
    let query = query.unwrap_or_default();

    if let Ok(base) = state.oauth_upstream() {
        let url = upstream_url(base, "/oauth/callback", Some(&query));
        match state.oauth_http.get(&url).send().await {
            Ok(response) if response.status().is_success() || response.status().is_redirection() => {
                return passthrough(response)
            }
            Ok(response) => {
                warn!(status = %response.status(), "[OAuth] Callback upstream rejected; rendering local page")
            }
            Err(e) => warn!("[OAuth] Callback upstream unreachable; rendering local page: {}", e),
        }
    } else {
        debug!("[OAuth] No authorization server; rendering local callback page");
    }

    match render_callback_page(&query) {
        Ok(page) => Html(page).into_response(),
        Err(e) => ApiError::Internal(format!("callback page: {}", e)).into_response(),
    }
}

/// `POST /oauth/token` and `POST /oauth/register`: verbatim passthrough.
async fn forward_post(state: &ProxyState, path: &str, headers: &HeaderMap, body: Bytes) -> ApiResult<Response> {
    let base = state.oauth_upstream()?;
    let response = state
        .http
        .post(upstream_url(base, path, None))
        .headers(forward_headers(headers))
        .timeout(state.config.upstream_timeout)
        .body(body)
        .send()
        .await
        .map_err(|e| upstream_failure(e, state.config.upstream_timeout))?;
    Ok(passthrough(response))
}

pub async fn token(State(state): State<ProxyState>, headers: HeaderMap, body: Bytes) -> ApiResult<Response> {
    forward_post(&state, "/oauth/token", &headers, body).await
}

pub async fn register(State(state): State<ProxyState>, headers: HeaderMap, body: Bytes) -> ApiResult<Response> {
    forward_post(&state, "/oauth/register", &headers, body).await
}

/// `GET /.well-known/oauth-authorization-server`
pub async fn metadata(State(state): State<ProxyState>, headers: HeaderMap) -> ApiResult<Response> {
    let base = state.oauth_upstream()?;
    let response = state
        .http
        .get(format!("{}/.well-known/oauth-authorization-server", base))
        .headers(forward_headers(&headers))
        .timeout(state.config.upstream_timeout)
        .send()
        .await
        .map_err(|e| upstream_failure(e, state.config.upstream_timeout))?;
    Ok(passthrough(response))
}

/// Local callback page: shows the code, a copy button and a token-exchange
/// form posting to `/oauth/token`.
pub fn render_callback_page(query: &str) -> Result<String, minijinja::Error> {
    let params: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    let get = |key: &str| {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    };

    if params.iter().any(|(k, _)| k == "error") {
        return templates::render(
            templates::OAUTH_ERROR,
            context! { error => get("error"), error_description => get("error_description") },
        );
    }
    templates::render(
        templates::OAUTH_CALLBACK,
        context! { code => get("code"), state => get("state") },
    )
}
