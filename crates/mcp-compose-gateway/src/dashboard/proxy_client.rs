//! Dashboard-side client for the proxy API

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use axum::{body::Bytes, http::Method, response::Response};
use mcp_compose_mcp::UpstreamError;
use reqwest::header;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::proxy::passthrough;
use crate::streaming::logs::LogFeed;
use crate::streaming::metrics::MetricsSource;
use crate::streaming::sse::sse_log_feed;

/// Bearer-authenticated calls to `<proxy>/api/*`
#[derive(Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    base: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ProxyClient {
    /// `timeout` applies to every call except log follows.
    pub fn new(base: impl Into<String>, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build proxy HTTP client")?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.request(method, format!("{}{}", self.base, path));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
    }

    fn failure(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::Unreachable(err.to_string())
        }
    }

    async fn json_response(&self, response: reqwest::Response) -> Result<Value, UpstreamError> {
        let status = response.status();
        let text = response.text().await.map_err(|e| self.failure(e))?;
        if !status.is_success() {
            return Err(UpstreamError::BadStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }

    pub async fn get_json(&self, path: &str) -> Result<Value, UpstreamError> {
        let response = self
            .request(Method::GET, path)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.failure(e))?;
        self.json_response(response).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, UpstreamError> {
        let response = self
            .request(Method::POST, path)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.failure(e))?;
        self.json_response(response).await
    }

    /// Body and content type of a GET, for documentation pages.
    pub async fn get_text(&self, path: &str) -> Result<(Option<String>, String), UpstreamError> {
        let response = self
            .request(Method::GET, path)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.failure(e))?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.map_err(|e| self.failure(e))?;
        if !status.is_success() {
            return Err(UpstreamError::BadStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok((content_type, text))
    }

    /// Forward a request verbatim and stream the proxy's response back.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> ApiResult<Response> {
        let mut request = self
            .request(method, path_and_query)
            .timeout(self.timeout)
            .body(body);
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Upstream(self.failure(e)))?;
        debug!(path = %path_and_query, status = %response.status(), "[Dashboard] Proxied");
        Ok(passthrough(response))
    }

    /// Follow a container's logs through the proxy's SSE endpoint.
    pub async fn log_feed(&self, container: &str, server: &str, tail: usize) -> Result<LogFeed, UpstreamError> {
        let path = format!(
            "/api/containers/{}/logs?follow=true&timestamps=true&tail={}",
            urlencoding::encode(container),
            tail
        );
        let response = self
            .request(Method::GET, &path)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| self.failure(e))?;
        if !response.status().is_success() {
            return Err(UpstreamError::BadStatus {
                status: response.status().as_u16(),
                body: String::new(),
            });
        }
        Ok(sse_log_feed(response.bytes_stream(), server.to_string()))
    }
}

#[async_trait]
impl MetricsSource for ProxyClient {
    async fn status(&self) -> Result<Value, String> {
        self.get_json("/api/status").await.map_err(|e| e.to_string())
    }

    async fn connections(&self) -> Result<Value, String> {
        self.get_json("/api/connections").await.map_err(|e| e.to_string())
    }
}
