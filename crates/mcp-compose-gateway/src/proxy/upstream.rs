//! Upstream discovery and resolution
//!
//! A server is routable when it is declared in the manifest and either has
//! an explicit `url` or a running workload. HTTP servers are addressed by
//! container name on the overlay network, or by `upstream_host` plus the
//! published port when the proxy runs outside it.

use std::collections::BTreeMap;

use mcp_compose_core::{branding, Manifest, Protocol, ServerConfig};
use mcp_compose_runtime::EngineErrorKind;
use serde::Serialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::proxy::ProxyState;

/// How to reach one server
#[derive(Debug, Clone, PartialEq)]
pub enum Upstream {
    Http { url: String },
    Stdio { container: String, command: Vec<String> },
}

/// Entry of the `/api/servers` map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredServer {
    pub name: String,
    pub container: Option<String>,
    pub status: String,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
}

/// URL of an HTTP upstream, or `None` when the server declares no port.
pub fn http_upstream_url(
    server: &str,
    config: &ServerConfig,
    upstream_host: Option<&str>,
) -> Option<String> {
    if let Some(url) = &config.url {
        return Some(url.clone());
    }
    let port = config.http_port?;
    let (host, port) = match upstream_host {
        Some(host) => (host.to_string(), config.published_port(port).unwrap_or(port)),
        None => (branding::container_name(server), port),
    };
    let path = config.http_path.as_deref().unwrap_or("/");
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    Some(format!("http://{}:{}{}", host, port, path))
}

/// Base URL (no JSON-RPC path) used for `/docs` and `/openapi.json`.
pub fn http_base_url(server: &str, config: &ServerConfig, upstream_host: Option<&str>) -> Option<String> {
    let full = http_upstream_url(server, config, upstream_host)?;
    let parsed = url::Url::parse(&full).ok()?;
    Some(parsed.origin().ascii_serialization())
}

impl ProxyState {
    /// Resolve a server for one request.
    pub async fn resolve_upstream(&self, server: &str) -> ApiResult<Upstream> {
        let manifest = self.control.manifest().await;
        let config = declared(&manifest, server)?;

        if let Some(url) = &config.url {
            return Ok(Upstream::Http { url: url.clone() });
        }

        let container = branding::container_name(server);
        let status = self.runtime.status(&container).await?;
        if !status.is_running() {
            return Err(ApiError::NotFound(format!(
                "Server '{}' is not running ({})",
                server,
                status.as_str()
            )));
        }

        match config.protocol {
            Protocol::Http => {
                let url = http_upstream_url(server, config, self.config.upstream_host.as_deref())
                    .ok_or_else(|| {
                        ApiError::Internal(format!("Server '{}' declares no http_port", server))
                    })?;
                Ok(Upstream::Http { url })
            }
            Protocol::Stdio => {
                let command = config.argv()?;
                if command.is_empty() {
                    return Err(ApiError::Internal(format!(
                        "Server '{}' uses stdio but declares no command to bridge",
                        server
                    )));
                }
                Ok(Upstream::Stdio { container, command })
            }
        }
    }

    /// Declared servers that `resolve_upstream` would route right now: a
    /// running workload or an explicit URL.
    pub async fn discover(&self) -> ApiResult<BTreeMap<String, DiscoveredServer>> {
        let manifest = self.control.manifest().await;
        let records = match self.runtime.list(branding::CONTAINER_PREFIX).await {
            Ok(records) => records,
            Err(e) if e.kind == EngineErrorKind::EngineAbsent => {
                debug!("[Proxy] No engine; discovery limited to remote servers");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut servers = BTreeMap::new();
        for (name, config) in &manifest.servers {
            let url = match config.protocol {
                Protocol::Http => {
                    http_upstream_url(name, config, self.config.upstream_host.as_deref())
                }
                Protocol::Stdio => config.url.clone(),
            };

            if config.url.is_some() {
                servers.insert(
                    name.clone(),
                    DiscoveredServer {
                        name: name.clone(),
                        container: None,
                        status: "remote".to_string(),
                        protocol: config.protocol,
                        url,
                        http_port: config.http_port,
                    },
                );
                continue;
            }

            let container = branding::container_name(name);
            let record = records
                .iter()
                .find(|r| r.name == container || r.server() == Some(name.as_str()));
            let Some(record) = record else { continue };
            if !record.status.is_running() {
                continue;
            }
            servers.insert(
                name.clone(),
                DiscoveredServer {
                    name: name.clone(),
                    container: Some(record.name.clone()),
                    status: record.status.as_str().to_string(),
                    protocol: config.protocol,
                    url,
                    http_port: config.http_port,
                },
            );
        }
        Ok(servers)
    }
}

fn declared<'a>(manifest: &'a Manifest, server: &str) -> ApiResult<&'a ServerConfig> {
    manifest
        .servers
        .get(server)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown server '{}'", server)))
}
