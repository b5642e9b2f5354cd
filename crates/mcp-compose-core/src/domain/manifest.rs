//! Compose manifest
//!
//! The manifest is a TOML document declaring servers plus settings for the
//! proxy, dashboard, activity store and auxiliary services:
//!
//! ```toml
//! [servers.filesystem]
//! image = "mcp/filesystem:latest"
//! command = "node dist/index.js /data"
//! volumes = ["./data:/data:ro"]
//!
//! [servers.search]
//! build = { context = "./search", dockerfile = "Dockerfile" }
//! protocol = "http"
//! http_port = 8080
//! depends_on = ["filesystem"]
//!
//! [proxy]
//! port = 9876
//! api_key = "${MCP_API_KEY}"
//! ```
//!
//! Environment variables always win over manifest values (see [`EnvOverrides`]).

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::workload::{
    validate_server_name, BuildContext, ResourceLimits, RestartPolicy, SecurityOptions,
    WorkloadSpec,
};
use crate::branding;
use crate::error::ConfigError;

lazy_static! {
    static ref INTERPOLATION: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").unwrap();
}

/// Substitute `${NAME}` and `${NAME:-default}` references.
///
/// Unset variables without a default expand to the empty string.
pub fn interpolate(value: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    INTERPOLATION
        .replace_all(value, |caps: &regex::Captures<'_>| {
            lookup(&caps[1])
                .or_else(|| caps.get(2).map(|d| d.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Transport a server speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Stdio,
    Http,
}

/// A command given either as a shell-style string or an argv list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Shell(String),
    Argv(Vec<String>),
}

impl CommandLine {
    pub fn to_argv(&self) -> Result<Vec<String>, ConfigError> {
        match self {
            Self::Argv(argv) => Ok(argv.clone()),
            Self::Shell(line) => shell_words::split(line).map_err(|e| ConfigError::InvalidValue {
                key: "command".to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// `build = { ... }` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

/// `[servers.<name>]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartPolicy>,
    pub pull: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub resources: ResourceLimits,
    pub security: SecurityOptions,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
    /// Path on the upstream that accepts JSON-RPC (default `/`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_path: Option<String>,
    /// Explicit upstream URL; bypasses address derivation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ServerConfig {
    /// Short stable hash of this configuration, recorded as a label so that
    /// reload can tell changed servers from unchanged ones.
    pub fn config_hash(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        hex::encode(&digest[..8])
    }

    /// Full command vector (`command` followed by `args`).
    pub fn argv(&self) -> Result<Vec<String>, ConfigError> {
        let mut argv = match &self.command {
            Some(command) => command.to_argv()?,
            None => Vec::new(),
        };
        argv.extend(self.args.iter().cloned());
        Ok(argv)
    }

    /// Translate into a runtime workload spec. Relative build contexts are
    /// resolved against `base_dir`.
    pub fn to_workload_spec(&self, name: &str, base_dir: &Path) -> Result<WorkloadSpec, ConfigError> {
        validate_server_name(name)?;

        let mut spec = match (&self.image, &self.build) {
            (image, Some(build)) => {
                let context = Path::new(&build.context);
                let context = if context.is_absolute() {
                    context.to_path_buf()
                } else {
                    base_dir.join(context)
                };
                let mut spec = WorkloadSpec::from_build(
                    name,
                    BuildContext {
                        context,
                        dockerfile: build.dockerfile.clone(),
                        args: build.args.clone(),
                    },
                );
                spec.image = image.clone();
                spec
            }
            (Some(image), None) => WorkloadSpec::new(name, image.clone()),
            (None, None) => {
                return Err(ConfigError::MissingImage {
                    server: name.to_string(),
                })
            }
        };

        spec.pull = self.pull;
        spec.command = self.argv()?;
        spec.env = self.env.clone();
        spec.ports = self.ports.clone();
        spec.volumes = self.volumes.clone();
        spec.workdir = self.workdir.clone();
        spec.restart = self.restart;
        spec.resources = self.resources.clone();
        spec.security = self.security.clone();
        spec.network_mode = self.network_mode.clone();
        spec.networks = self.networks.clone();
        spec.labels = self.labels.clone();
        spec.labels
            .insert(branding::LABEL_SERVER.to_string(), name.to_string());
        spec.labels
            .insert(branding::LABEL_CONFIG_HASH.to_string(), self.config_hash());
        spec.interactive = self.protocol == Protocol::Stdio;
        Ok(spec)
    }

    /// Host port published for `container_port`, if the server maps one.
    pub fn published_port(&self, container_port: u16) -> Option<u16> {
        self.ports.iter().find_map(|mapping| {
            let mapping = mapping.split('/').next().unwrap_or(mapping);
            let parts: Vec<&str> = mapping.split(':').collect();
            let (host, container) = match parts.as_slice() {
                [host, container] => (*host, *container),
                [_ip, host, container] => (*host, *container),
                _ => return None,
            };
            if container.parse::<u16>().ok()? == container_port {
                host.parse().ok()
            } else {
                None
            }
        })
    }
}

/// `[networks.<name>]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub driver: Option<String>,
    /// Managed outside this manifest; never created or removed
    pub external: bool,
}

/// `[proxy.oauth]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSection {
    pub enabled: bool,
    /// Base URL of the downstream authorization server
    pub authorization_server: Option<String>,
    /// Requests per minute allowed on each `/oauth/*` path
    pub rate_limit_per_minute: u32,
}

impl Default for OAuthSection {
    fn default() -> Self {
        Self {
            enabled: false,
            authorization_server: None,
            rate_limit_per_minute: 60,
        }
    }
}

/// `[proxy]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySection {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    /// Address other processes use to reach the proxy (MCP_PROXY_URL)
    pub public_url: Option<String>,
    /// Host used for HTTP upstreams. When unset the container name is used,
    /// which only resolves from inside the overlay network; set to
    /// `localhost` when the proxy runs on the host and servers publish ports.
    pub upstream_host: Option<String>,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub oauth: OAuthSection,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: branding::DEFAULT_PROXY_PORT,
            api_key: None,
            public_url: None,
            upstream_host: None,
            read_timeout_secs: 15,
            write_timeout_secs: 15,
            idle_timeout_secs: 60,
            oauth: OAuthSection::default(),
        }
    }
}

impl ProxySection {
    /// Base URL of the proxy without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

/// `[dashboard]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub theme: String,
    /// Run the dashboard as a container instead of in-process
    pub containerized: bool,
    pub image: Option<String>,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: branding::DEFAULT_DASHBOARD_PORT,
            theme: "dark".to_string(),
            containerized: false,
            image: None,
        }
    }
}

impl DashboardSection {
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

/// `[activity]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivitySection {
    /// SQLite file for the durable store; no store when unset
    pub database: Option<PathBuf>,
    pub retention_days: u32,
    pub replay_limit: usize,
    pub mailbox_capacity: usize,
    /// Dashboard intake URL when the bus lives in another process
    pub webhook_url: Option<String>,
}

impl Default for ActivitySection {
    fn default() -> Self {
        Self {
            database: None,
            retention_days: 30,
            replay_limit: 50,
            mailbox_capacity: 1000,
            webhook_url: None,
        }
    }
}

/// `[inspector]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorSection {
    pub timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for InspectorSection {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            idle_timeout_secs: 30 * 60,
            sweep_interval_secs: 5 * 60,
        }
    }
}

/// `[memory]`: memory server plus its backing Postgres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub enabled: bool,
    /// Prebuilt image; the embedded Dockerfile is built when unset
    pub image: Option<String>,
    pub port: u16,
    pub postgres_image: String,
    pub postgres_user: String,
    pub postgres_db: String,
    pub postgres_password: Option<String>,
    /// Full connection string; derived from the fields above when unset
    pub postgres_url: Option<String>,
    pub cpus: Option<f64>,
    pub memory: Option<String>,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            enabled: false,
            image: None,
            port: 3001,
            postgres_image: "postgres:16-alpine".to_string(),
            postgres_user: "postgres".to_string(),
            postgres_db: "memory_graph".to_string(),
            postgres_password: None,
            postgres_url: None,
            cpus: Some(1.0),
            memory: Some("1g".to_string()),
        }
    }
}

/// `[task_scheduler]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSchedulerSection {
    pub enabled: bool,
    pub image: Option<String>,
    pub port: u16,
    /// Host directory mounted as the scheduler workspace
    pub workspace: Option<String>,
    pub cpus: Option<f64>,
    pub memory: Option<String>,
}

impl Default for TaskSchedulerSection {
    fn default() -> Self {
        Self {
            enabled: false,
            image: None,
            port: 8018,
            workspace: None,
            cpus: Some(2.0),
            memory: Some("1g".to_string()),
        }
    }
}

/// Whole manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub version: Option<String>,
    pub servers: BTreeMap<String, ServerConfig>,
    pub networks: BTreeMap<String, NetworkConfig>,
    pub proxy: ProxySection,
    pub dashboard: DashboardSection,
    pub activity: ActivitySection,
    pub inspector: InspectorSection,
    pub memory: MemorySection,
    pub task_scheduler: TaskSchedulerSection,

    /// Directory the manifest was loaded from; relative paths resolve here
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Manifest {
    /// Read, interpolate and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let lookup = |k: &str| std::env::var(k).ok();
        let mut manifest = Self::parse(&raw, path, &lookup)?;
        manifest.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(manifest)
    }

    /// Parse and validate manifest text. `path` is only used in errors.
    pub fn parse(
        raw: &str,
        path: &Path,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut manifest: Manifest = toml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        manifest.base_dir = PathBuf::from(".");
        manifest.interpolate(lookup);
        manifest.validate()?;
        Ok(manifest)
    }

    fn interpolate(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        for server in self.servers.values_mut() {
            for value in server.env.values_mut() {
                *value = interpolate(value, lookup);
            }
            if let Some(image) = server.image.as_mut() {
                *image = interpolate(image, lookup);
            }
        }
        if let Some(key) = self.proxy.api_key.as_mut() {
            *key = interpolate(key, lookup);
        }
        if self.proxy.api_key.as_deref() == Some("") {
            self.proxy.api_key = None;
        }
        if let Some(password) = self.memory.postgres_password.as_mut() {
            *password = interpolate(password, lookup);
        }
    }

    /// Names taken by enabled auxiliary services, paired with the service
    /// that owns them. Their containers share the `mcp-compose-` namespace
    /// with user servers.
    pub fn reserved_names(&self) -> Vec<(&'static str, &'static str)> {
        let mut names = Vec::new();
        if self.memory.enabled {
            names.push(("memory", "memory"));
            names.push(("memory-postgres", "memory"));
        }
        if self.task_scheduler.enabled {
            names.push(("task-scheduler", "task-scheduler"));
        }
        if self.dashboard.enabled && self.dashboard.containerized {
            names.push(("dashboard", "dashboard"));
        }
        names
    }

    /// Check names, image sources and the dependency graph.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reserved = self.reserved_names();
        for (name, server) in &self.servers {
            validate_server_name(name)?;
            if let Some((_, service)) = reserved.iter().find(|(taken, _)| taken == name) {
                return Err(ConfigError::ReservedName {
                    name: name.clone(),
                    service,
                });
            }
            if server.image.is_none() && server.build.is_none() && server.url.is_none() {
                return Err(ConfigError::MissingImage {
                    server: name.clone(),
                });
            }
            for dependency in &server.depends_on {
                if !self.servers.contains_key(dependency) {
                    return Err(ConfigError::UnknownDependency {
                        server: name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
            if server.protocol == Protocol::Http && server.http_port.is_none() && server.url.is_none() {
                return Err(ConfigError::InvalidValue {
                    key: format!("servers.{name}.http_port"),
                    message: "http servers need http_port or url".to_string(),
                });
            }
        }
        for name in self.networks.keys() {
            validate_server_name(name)?;
        }
        if self.activity.retention_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "activity.retention_days".to_string(),
                message: "must be positive".to_string(),
            });
        }
        self.dependency_order(&[])?;
        Ok(())
    }

    /// Servers to act on, dependencies first. An empty selection means every
    /// declared server; a non-empty one pulls in transitive dependencies.
    pub fn dependency_order(&self, selected: &[String]) -> Result<Vec<String>, ConfigError> {
        let roots: Vec<&String> = if selected.is_empty() {
            self.servers.keys().collect()
        } else {
            for name in selected {
                if !self.servers.contains_key(name) {
                    return Err(ConfigError::UnknownServer(name.clone()));
                }
            }
            selected.iter().collect()
        };

        let mut order = Vec::new();
        let mut done = BTreeSet::new();
        let mut visiting = BTreeSet::new();
        for root in roots {
            self.visit(root, &mut visiting, &mut done, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        visiting: &mut BTreeSet<String>,
        done: &mut BTreeSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        if done.contains(name) {
            return Ok(());
        }
        if !visiting.insert(name.to_string()) {
            return Err(ConfigError::DependencyCycle(name.to_string()));
        }
        if let Some(server) = self.servers.get(name) {
            for dependency in &server.depends_on {
                self.visit(dependency, visiting, done, order)?;
            }
        }
        visiting.remove(name);
        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }

    /// Workload spec for one declared server.
    pub fn workload_spec(&self, name: &str) -> Result<WorkloadSpec, ConfigError> {
        let server = self
            .servers
            .get(name)
            .ok_or_else(|| ConfigError::UnknownServer(name.to_string()))?;
        server.to_workload_spec(name, &self.base_dir)
    }

    /// Networks to ensure before starting servers: the default network plus
    /// every non-external declared network.
    pub fn managed_networks(&self) -> Vec<(String, String)> {
        let mut networks = vec![(
            branding::DEFAULT_NETWORK.to_string(),
            branding::DEFAULT_NETWORK_DRIVER.to_string(),
        )];
        for (name, config) in &self.networks {
            if config.external || name == branding::DEFAULT_NETWORK {
                continue;
            }
            let driver = config
                .driver
                .clone()
                .unwrap_or_else(|| branding::DEFAULT_NETWORK_DRIVER.to_string());
            networks.push((name.clone(), driver));
        }
        networks
    }

    pub fn apply_env(&mut self, env: &EnvOverrides) {
        if let Some(url) = &env.proxy_url {
            self.proxy.public_url = Some(url.clone());
        }
        if let Some(key) = &env.api_key {
            self.proxy.api_key = Some(key.clone()).filter(|k| !k.is_empty());
        }
        if let Some(port) = env.proxy_port {
            self.proxy.port = port;
        }
        if let Some(host) = &env.dashboard_host {
            self.dashboard.host = host.clone();
        }
        if let Some(port) = env.dashboard_port {
            self.dashboard.port = port;
        }
        if let Some(theme) = &env.dashboard_theme {
            self.dashboard.theme = theme.clone();
        }
        if let Some(enabled) = env.dashboard_enabled {
            self.dashboard.enabled = enabled;
        }
        if let Some(db) = &env.activity_db {
            self.activity.database = Some(db.clone());
        }
        if let Some(days) = env.retention_days {
            self.activity.retention_days = days;
        }
        if let Some(url) = &env.webhook_url {
            self.activity.webhook_url = Some(url.clone());
        }
        if let Some(url) = &env.postgres_url {
            self.memory.postgres_url = Some(url.clone());
        }
        if let Some(password) = &env.postgres_password {
            self.memory.postgres_password = Some(password.clone());
        }
    }
}

/// Environment overrides. Every field maps to one variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub proxy_url: Option<String>,
    pub api_key: Option<String>,
    pub proxy_port: Option<u16>,
    pub dashboard_host: Option<String>,
    pub dashboard_port: Option<u16>,
    pub dashboard_theme: Option<String>,
    pub dashboard_enabled: Option<bool>,
    pub activity_db: Option<PathBuf>,
    pub retention_days: Option<u32>,
    pub webhook_url: Option<String>,
    pub postgres_url: Option<String>,
    pub postgres_password: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let retention_days = parse_var::<u32>(&get, "MCP_ACTIVITY_RETENTION_DAYS")?;
        if retention_days == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "MCP_ACTIVITY_RETENTION_DAYS".to_string(),
                message: "must be positive".to_string(),
            });
        }

        Ok(Self {
            proxy_url: get("MCP_PROXY_URL"),
            // An explicitly empty key disables auth, so keep it distinct from unset
            api_key: lookup("MCP_API_KEY").map(|v| v.trim().to_string()),
            proxy_port: parse_var(&get, "MCP_PROXY_PORT")?,
            dashboard_host: get("MCP_DASHBOARD_HOST"),
            dashboard_port: parse_var(&get, "MCP_DASHBOARD_PORT")?,
            dashboard_theme: get("MCP_DASHBOARD_THEME"),
            dashboard_enabled: get("MCP_DASHBOARD_ENABLED")
                .map(|v| parse_bool("MCP_DASHBOARD_ENABLED", &v))
                .transpose()?,
            activity_db: get("MCP_ACTIVITY_DB").map(PathBuf::from),
            retention_days,
            webhook_url: get("MCP_ACTIVITY_WEBHOOK_URL"),
            postgres_url: get("POSTGRES_URL"),
            postgres_password: get("POSTGRES_PASSWORD"),
        })
    }
}

fn parse_var<T>(get: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|v| {
            v.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
