//! Workload specification and runtime record
//!
//! A workload is a named container the runtime driver brings to a desired
//! state. The spec is what we ask for; the record is what the engine reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::branding;
use crate::error::ConfigError;

/// Longest server name we accept (keeps `<prefix>-<server>` under DNS label limits).
pub const MAX_SERVER_NAME_LEN: usize = 63;

/// Validate a server name before it is turned into a canonical container name.
///
/// Names may not contain separators or whitespace so that the prefix can
/// never be escaped.
pub fn validate_server_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidServerName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > MAX_SERVER_NAME_LEN {
        return Err(invalid("name is longer than 63 characters"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(invalid("name contains whitespace"));
    }
    if name.contains('/') || name.contains('\\') || name.contains(':') {
        return Err(invalid("name contains a path or port separator"));
    }
    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("name must start with a letter or digit"));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
        return Err(invalid("name may only contain letters, digits, '-', '_' and '.'"));
    }
    Ok(())
}

/// Normalized workload status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadStatus {
    Starting,
    Running,
    Paused,
    Stopped,
    #[default]
    Unknown,
}

impl WorkloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }

    /// Normalize an engine state string.
    ///
    /// An empty string or a "no such container" message means the workload is
    /// absent, which is reported as `stopped` rather than an error.
    pub fn from_engine(state: &str) -> Self {
        let state = state.trim().trim_matches('\'').trim_matches('"').to_lowercase();
        if state.is_empty() || state.contains("no such container") || state.contains("no such object") {
            return Self::Stopped;
        }
        match state.as_str() {
            "running" => Self::Running,
            "created" | "restarting" | "configured" | "initialized" => Self::Starting,
            "paused" => Self::Paused,
            "exited" | "dead" | "stopped" | "removing" => Self::Stopped,
            _ => Self::Unknown,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    #[default]
    No,
    Always,
    OnFailure,
    UnlessStopped,
}

impl RestartPolicy {
    /// Value for the engine's `--restart` flag.
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Always => "always",
            Self::OnFailure => "on-failure",
            Self::UnlessStopped => "unless-stopped",
        }
    }
}

/// Local build context for an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildContext {
    /// Root of the build context
    pub context: PathBuf,
    /// Dockerfile name, absolute or relative to the context (default `Dockerfile`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// Build arguments forwarded as `--build-arg K=V`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

impl BuildContext {
    pub fn new(context: impl Into<PathBuf>) -> Self {
        Self {
            context: context.into(),
            dockerfile: None,
            args: BTreeMap::new(),
        }
    }

    /// Resolve the dockerfile path: absolute paths are kept, relative ones
    /// are joined onto the context.
    pub fn dockerfile_path(&self) -> PathBuf {
        let name = self.dockerfile.as_deref().unwrap_or("Dockerfile");
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.context.join(path)
        }
    }
}

/// CPU and memory caps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Fractional CPU count (`--cpus`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<f64>,
    /// Memory with unit suffix, e.g. `512m` (`--memory`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

impl ResourceLimits {
    pub fn is_empty(&self) -> bool {
        self.cpus.is_none() && self.memory.is_none()
    }
}

/// Security flags applied at `run`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cap_drop: Vec<String>,
    #[serde(default)]
    pub no_new_privileges: bool,
    #[serde(default)]
    pub read_only: bool,
    /// `uid:gid` or user name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Everything the runtime driver needs to materialize one workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Server name (the canonical container name is derived from it)
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildContext>,
    /// Pull the image before running
    #[serde(default)]
    pub pull: bool,
    /// Command vector (entrypoint override); `args` are appended
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// `host:container` port mappings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// `source:target[:mode]` volume mounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartPolicy>,
    #[serde(default)]
    pub resources: ResourceLimits,
    #[serde(default)]
    pub security: SecurityOptions,
    /// Pinned network mode; replaces the default network as primary attachment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    /// Networks to attach, primary first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Keep STDIN open (stdio-transport servers)
    #[serde(default = "default_true")]
    pub interactive: bool,
}

fn default_true() -> bool {
    true
}

impl WorkloadSpec {
    /// Spec for a prebuilt image.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: Some(image.into()),
            build: None,
            pull: false,
            command: Vec::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
            workdir: None,
            restart: None,
            resources: ResourceLimits::default(),
            security: SecurityOptions::default(),
            network_mode: None,
            networks: Vec::new(),
            labels: BTreeMap::new(),
            interactive: true,
        }
    }

    /// Spec built from a local context.
    pub fn from_build(name: impl Into<String>, build: BuildContext) -> Self {
        let mut spec = Self::new(name, "");
        spec.image = None;
        spec.build = Some(build);
        spec
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.networks.push(network.into());
        self
    }

    pub fn with_restart(mut self, policy: RestartPolicy) -> Self {
        self.restart = Some(policy);
        self
    }

    /// Canonical container name (`<prefix>-<server>`).
    pub fn container_name(&self) -> String {
        branding::container_name(&self.name)
    }

    /// Image reference to run: the explicit image, or the deterministic tag
    /// for a local build.
    pub fn image_ref(&self) -> String {
        match &self.image {
            Some(image) if !image.is_empty() => image.clone(),
            _ => branding::built_image_tag(&self.name),
        }
    }

    /// Primary network: the pinned mode, else the first listed network, else
    /// the default overlay network.
    pub fn primary_network(&self) -> String {
        if let Some(mode) = &self.network_mode {
            return mode.clone();
        }
        self.networks
            .first()
            .cloned()
            .unwrap_or_else(|| branding::DEFAULT_NETWORK.to_string())
    }

    /// Networks to attach after `run` (everything but the primary).
    pub fn additional_networks(&self) -> Vec<String> {
        let primary = self.primary_network();
        let mut seen = Vec::new();
        for network in &self.networks {
            if *network != primary && !seen.contains(network) {
                seen.push(network.clone());
            }
        }
        seen
    }

    /// Whether the primary attachment is a user-defined network we should
    /// create (engine modes like `host`, `none`, `container:<id>` are not).
    pub fn primary_network_is_managed(&self) -> bool {
        let primary = self.primary_network();
        !matches!(primary.as_str(), "host" | "none" | "bridge" | "default")
            && !primary.starts_with("container:")
    }
}

/// What the runtime driver observed for a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    /// Opaque runtime id
    pub id: String,
    /// Canonical container name
    pub name: String,
    pub status: WorkloadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl WorkloadRecord {
    /// Server name derived from the canonical container name.
    pub fn server(&self) -> Option<&str> {
        self.labels
            .get(branding::LABEL_SERVER)
            .map(String::as_str)
            .or_else(|| branding::server_from_container(&self.name))
    }

    /// Config hash label recorded at start, if any.
    pub fn config_hash(&self) -> Option<&str> {
        self.labels.get(branding::LABEL_CONFIG_HASH).map(String::as_str)
    }
}

/// A managed network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub name: String,
    pub driver: String,
    pub exists: bool,
}

impl NetworkRecord {
    pub fn default_network() -> Self {
        Self {
            name: branding::DEFAULT_NETWORK.to_string(),
            driver: branding::DEFAULT_NETWORK_DRIVER.to_string(),
            exists: false,
        }
    }
}
