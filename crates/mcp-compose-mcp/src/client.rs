//! HTTP JSON-RPC client that reaches MCP servers through the proxy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use tracing::debug;

use crate::error::UpstreamError;
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

/// Sends one JSON-RPC request to a named server and returns its response.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(
        &self,
        server: &str,
        request: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, UpstreamError>;
}

/// POSTs `<proxy_base>/<server>` with bearer auth.
#[derive(Clone)]
pub struct McpHttpClient {
    http: reqwest::Client,
    proxy_base: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl McpHttpClient {
    pub fn new(proxy_base: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            proxy_base: proxy_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
        }
    }

    pub fn proxy_base(&self) -> &str {
        &self.proxy_base
    }

    pub fn server_url(&self, server: &str) -> String {
        format!("{}/{}", self.proxy_base, urlencoding::encode(server))
    }
}

#[async_trait]
impl RpcTransport for McpHttpClient {
    async fn call(
        &self,
        server: &str,
        request: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, UpstreamError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        let url = self.server_url(server);
        debug!(server = %server, method = %request.method, "[Inspector] → {}", url);

        let mut builder = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .header(CONTENT_LENGTH, body.len());
        if let Some(key) = &self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/event-stream"));
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            return Err(UpstreamError::BadStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_response_body(&text, is_sse)
    }
}

/// Parse a JSON body, or the last `data:` frame of an SSE body.
pub fn parse_response_body(text: &str, is_sse: bool) -> Result<JsonRpcResponse, UpstreamError> {
    let payload = if is_sse {
        text.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim)
            .filter(|data| !data.is_empty())
            .last()
            .ok_or_else(|| UpstreamError::Malformed("event stream carried no data".to_string()))?
    } else {
        text
    };

    serde_json::from_str(payload).map_err(|e| UpstreamError::Malformed(e.to_string()))
}
