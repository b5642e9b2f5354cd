//! Compose: lifecycle of the declared servers and auxiliary services
//!
//! The engine is the source of truth; nothing here caches workload state.
//! Mutating operations are serialized by one lifecycle lock so that `up`,
//! `down` and `reload` never interleave.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use mcp_compose_core::{
    branding, kinds, ActivityEvent, ActivityPublisher, ComposeControl, ConfigError, ControlError,
    EnvOverrides, Manifest, Protocol, ReloadSummary, ServerState, WorkloadStatus,
};
use mcp_compose_runtime::{ContainerRuntime, EngineErrorKind};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{ComposeError, ComposeResult};
use crate::plan::{desired_hashes, plan_reload};
use crate::services::{enabled_services, AuxiliaryService, ServiceContext, ServiceTiming, StartOutcome};

/// Result of `up`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpSummary {
    pub started: Vec<String>,
    pub already_running: Vec<String>,
    pub services: BTreeMap<String, StartOutcome>,
}

/// Where `reload` re-reads the manifest from
#[derive(Debug, Clone)]
struct ManifestSource {
    path: PathBuf,
    env: EnvOverrides,
}

pub struct Compose {
    runtime: Arc<dyn ContainerRuntime>,
    publisher: ActivityPublisher,
    manifest: RwLock<Manifest>,
    source: Option<ManifestSource>,
    timing: ServiceTiming,
    lifecycle: Mutex<()>,
}

impl Compose {
    /// Compose over an already loaded manifest; `reload` re-converges it.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, publisher: ActivityPublisher, manifest: Manifest) -> Self {
        Self {
            runtime,
            publisher,
            manifest: RwLock::new(manifest),
            source: None,
            timing: ServiceTiming::default(),
            lifecycle: Mutex::new(()),
        }
    }

    /// Load `path`, apply environment overrides, and remember both for `reload`.
    pub fn load(
        runtime: Arc<dyn ContainerRuntime>,
        publisher: ActivityPublisher,
        path: PathBuf,
        env: EnvOverrides,
    ) -> ComposeResult<Self> {
        let manifest = read_manifest(&path, &env)?;
        let mut compose = Self::new(runtime, publisher, manifest);
        compose.source = Some(ManifestSource { path, env });
        Ok(compose)
    }

    pub fn with_timing(mut self, timing: ServiceTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    pub async fn snapshot(&self) -> Manifest {
        self.manifest.read().await.clone()
    }

    fn manifest_path(&self) -> Option<&PathBuf> {
        self.source.as_ref().map(|s| &s.path)
    }

    fn service_context(&self) -> ServiceContext {
        ServiceContext {
            runtime: self.runtime.clone(),
            publisher: self.publisher.clone(),
            timing: self.timing,
        }
    }

    fn announce(&self, server: &str, action: &str, message: String) {
        self.publisher.publish(
            ActivityEvent::info(kinds::SERVICE, message)
                .with_server(server)
                .with_detail("action", action),
        );
    }

    fn announce_failure(&self, server: &str, action: &str, err: &dyn std::fmt::Display) {
        self.publisher.publish(
            ActivityEvent::error(kinds::SERVICE, format!("Failed to {} '{}': {}", action, server, err))
                .with_server(server)
                .with_detail("action", action),
        );
    }

    /// Bring servers up, dependencies first. An empty selection means every
    /// declared server plus the enabled auxiliary services.
    ///
    /// Stops at the first failure; servers started before it stay up and are
    /// listed in [`ComposeError::PartialUp`].
    pub async fn up(&self, servers: &[String]) -> ComposeResult<UpSummary> {
        let _guard = self.lifecycle.lock().await;
        let manifest = self.snapshot().await;
        let order = manifest.dependency_order(servers)?;
        self.ensure_networks(&manifest).await?;

        let mut summary = UpSummary::default();
        for server in order {
            if is_remote(&manifest, &server) {
                debug!(server = %server, "[Compose] Remote server, nothing to start");
                continue;
            }
            match self.start_declared(&manifest, &server, false).await {
                Ok(true) => summary.started.push(server),
                Ok(false) => summary.already_running.push(server),
                Err(ComposeError::Engine(source)) if !source.is_engine_absent() => {
                    self.announce_failure(&server, "start", &source);
                    warn!(
                        server = %server,
                        started = ?summary.started,
                        "[Compose] Up aborted; started servers left running"
                    );
                    return Err(ComposeError::PartialUp {
                        started: summary.started,
                        failed: server,
                        source,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if servers.is_empty() {
            let ctx = self.service_context();
            for service in enabled_services(&manifest, self.manifest_path()) {
                let outcome = service.start(&ctx).await.inspect_err(|e| {
                    self.announce_failure(service.name(), "start", e);
                })?;
                summary.services.insert(service.name().to_string(), outcome);
            }
        }

        info!(
            started = summary.started.len(),
            already_running = summary.already_running.len(),
            services = summary.services.len(),
            "[Compose] Up complete"
        );
        Ok(summary)
    }

    /// Stop and remove servers. An empty selection takes everything down,
    /// dependents first, then the auxiliary services and managed networks.
    pub async fn down(&self, servers: &[String]) -> ComposeResult<Vec<String>> {
        let _guard = self.lifecycle.lock().await;
        let manifest = self.snapshot().await;

        let targets = if servers.is_empty() {
            let mut order = manifest.dependency_order(&[])?;
            order.reverse();
            order
        } else {
            for server in servers {
                if !manifest.servers.contains_key(server) {
                    return Err(ConfigError::UnknownServer(server.clone()).into());
                }
            }
            servers.to_vec()
        };

        let mut stopped = Vec::new();
        for server in targets {
            if is_remote(&manifest, &server) {
                continue;
            }
            self.runtime.stop(&branding::container_name(&server)).await?;
            self.announce(&server, "stop", format!("Server '{}' stopped", server));
            stopped.push(server);
        }

        if servers.is_empty() {
            let ctx = self.service_context();
            for service in enabled_services(&manifest, self.manifest_path()).iter().rev() {
                service.stop(&ctx).await?;
            }
            self.remove_networks(&manifest).await?;
        }

        info!(stopped = stopped.len(), "[Compose] Down complete");
        Ok(stopped)
    }

    /// Status of every declared server from one engine listing.
    pub async fn ps(&self) -> ComposeResult<Vec<ServerState>> {
        let manifest = self.snapshot().await;
        let records = self.runtime.list(branding::CONTAINER_PREFIX).await?;

        Ok(manifest
            .servers
            .iter()
            .map(|(name, config)| {
                let container = branding::container_name(name);
                let status = if config.url.is_some() {
                    WorkloadStatus::Unknown
                } else {
                    records
                        .iter()
                        .find(|r| r.name == container)
                        .map(|r| r.status)
                        .unwrap_or(WorkloadStatus::Stopped)
                };
                ServerState {
                    server: name.clone(),
                    container,
                    status,
                    protocol: config.protocol,
                    http_port: config.http_port,
                }
            })
            .collect())
    }

    /// Status of the enabled auxiliary services.
    pub async fn services_ps(&self) -> ComposeResult<Vec<ServerState>> {
        let manifest = self.snapshot().await;
        let mut states = Vec::new();
        for service in enabled_services(&manifest, self.manifest_path()) {
            let container = service.container();
            let status = self.runtime.status(&container).await?;
            let route = service.route(None);
            states.push(ServerState {
                server: service.name().to_string(),
                container,
                status,
                protocol: route.as_ref().map(|r| r.protocol).unwrap_or(Protocol::Http),
                http_port: route.and_then(|r| r.http_port),
            });
        }
        Ok(states)
    }

    /// Re-read the manifest (when loaded from a file) and converge: removed
    /// servers stop, added ones start, changed ones are recreated.
    pub async fn reload(&self) -> ComposeResult<ReloadSummary> {
        let _guard = self.lifecycle.lock().await;
        let next = match &self.source {
            Some(source) => read_manifest(&source.path, &source.env)?,
            None => self.snapshot().await,
        };

        let records = self.runtime.list(branding::CONTAINER_PREFIX).await?;
        let plan = plan_reload(&desired_hashes(&next), &records);
        info!(
            start = ?plan.start,
            stop = ?plan.stop,
            recreate = ?plan.recreate,
            unchanged = plan.unchanged.len(),
            "[Compose] Reload plan"
        );

        *self.manifest.write().await = next.clone();

        for server in &plan.stop {
            self.runtime.stop(&branding::container_name(server)).await?;
            self.announce(server, "stop", format!("Server '{}' removed from manifest", server));
        }

        if !plan.is_noop() {
            self.ensure_networks(&next).await?;
        }
        for server in next.dependency_order(&[])? {
            let recreate = plan.recreate.contains(&server);
            if !recreate && !plan.start.contains(&server) {
                continue;
            }
            self.start_declared(&next, &server, true)
                .await
                .inspect_err(|e| self.announce_failure(&server, "start", e))?;
            if recreate {
                self.announce(&server, "recreate", format!("Server '{}' recreated", server));
            }
        }

        let ctx = self.service_context();
        for service in enabled_services(&next, self.manifest_path()) {
            service.start(&ctx).await?;
        }

        Ok(ReloadSummary {
            started: plan.start,
            stopped: plan.stop,
            recreated: plan.recreate,
            unchanged: plan.unchanged,
        })
    }

    pub async fn start(&self, name: &str) -> ComposeResult<()> {
        let _guard = self.lifecycle.lock().await;
        let manifest = self.snapshot().await;
        match self.target(&manifest, name)? {
            Target::Server => {
                self.ensure_networks(&manifest).await?;
                self.start_declared(&manifest, name, false).await?;
            }
            Target::Service(service) => {
                service.start(&self.service_context()).await?;
            }
        }
        Ok(())
    }

    pub async fn stop(&self, name: &str) -> ComposeResult<()> {
        let _guard = self.lifecycle.lock().await;
        let manifest = self.snapshot().await;
        match self.target(&manifest, name)? {
            Target::Server => {
                self.runtime.stop(&branding::container_name(name)).await?;
                self.announce(name, "stop", format!("Server '{}' stopped", name));
            }
            Target::Service(service) => service.stop(&self.service_context()).await?,
        }
        Ok(())
    }

    /// Stop, pause, start.
    pub async fn restart(&self, name: &str) -> ComposeResult<()> {
        let _guard = self.lifecycle.lock().await;
        let manifest = self.snapshot().await;
        match self.target(&manifest, name)? {
            Target::Server => {
                self.runtime.stop(&branding::container_name(name)).await?;
                tokio::time::sleep(self.timing.restart_pause).await;
                self.ensure_networks(&manifest).await?;
                self.start_declared(&manifest, name, true).await?;
                self.announce(name, "restart", format!("Server '{}' restarted", name));
            }
            Target::Service(service) => {
                service.restart(&self.service_context()).await?;
            }
        }
        Ok(())
    }

    /// A declared local server, or an enabled auxiliary service.
    fn target(&self, manifest: &Manifest, name: &str) -> ComposeResult<Target> {
        if let Some(config) = manifest.servers.get(name) {
            if config.url.is_some() {
                return Err(ConfigError::InvalidValue {
                    key: format!("servers.{}", name),
                    message: "remote servers are not managed by compose".to_string(),
                }
                .into());
            }
            return Ok(Target::Server);
        }
        enabled_services(manifest, self.manifest_path())
            .into_iter()
            .find(|s| s.name() == name)
            .map(Target::Service)
            .ok_or_else(|| ConfigError::UnknownServer(name.to_string()).into())
    }

    /// Start one declared server. Unless `force`, a running container with
    /// the same config hash is left alone. Returns whether it was started.
    async fn start_declared(&self, manifest: &Manifest, server: &str, force: bool) -> ComposeResult<bool> {
        let spec = manifest.workload_spec(server)?;
        let container = spec.container_name();

        if !force {
            if let Some(record) = self.runtime.inspect(&container).await? {
                let wanted = spec.labels.get(branding::LABEL_CONFIG_HASH).map(String::as_str);
                if record.status.is_running() && record.config_hash() == wanted {
                    debug!(server = %server, "[Compose] Already running with current config");
                    return Ok(false);
                }
            }
        }

        info!(server = %server, container = %container, image = %spec.image_ref(), "[Compose] Starting server");
        self.runtime.start(&spec).await?;
        self.announce(server, "start", format!("Server '{}' started", server));
        Ok(true)
    }

    async fn ensure_networks(&self, manifest: &Manifest) -> ComposeResult<()> {
        for (name, driver) in manifest.managed_networks() {
            if self.runtime.network_exists(&name).await? {
                continue;
            }
            self.runtime.network_create(&name, &driver).await?;
            info!(network = %name, driver = %driver, "[Compose] Network created");
            self.publisher.publish(
                ActivityEvent::info(kinds::NETWORK, format!("Network '{}' created", name))
                    .with_detail("network", name.clone()),
            );
        }
        Ok(())
    }

    /// Remove managed networks; one still in use is a warning.
    async fn remove_networks(&self, manifest: &Manifest) -> ComposeResult<()> {
        for (name, _) in manifest.managed_networks().into_iter().rev() {
            match self.runtime.network_remove(&name).await {
                Ok(()) => debug!(network = %name, "[Compose] Network removed"),
                Err(e) if e.kind == EngineErrorKind::Busy => {
                    warn!(network = %name, "[Compose] Network still in use, left in place");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

enum Target {
    Server,
    Service(Box<dyn AuxiliaryService>),
}

fn read_manifest(path: &std::path::Path, env: &EnvOverrides) -> ComposeResult<Manifest> {
    let mut manifest = Manifest::load(path)?;
    manifest.apply_env(env);
    // overrides can enable services whose names a server already took
    manifest.validate()?;
    Ok(manifest)
}

fn is_remote(manifest: &Manifest, server: &str) -> bool {
    manifest
        .servers
        .get(server)
        .is_some_and(|config| config.url.is_some())
}

#[async_trait]
impl ComposeControl for Compose {
    /// The manifest as the proxy routes it: declared servers plus the MCP
    /// routes of enabled services. Validation keeps the two name sets apart.
    async fn manifest(&self) -> Manifest {
        let mut manifest = self.snapshot().await;
        let upstream_host = manifest.proxy.upstream_host.clone();
        for service in enabled_services(&manifest, None) {
            if let Some(route) = service.route(upstream_host.as_deref()) {
                manifest
                    .servers
                    .entry(service.name().to_string())
                    .or_insert(route);
            }
        }
        manifest
    }

    async fn ps(&self) -> Result<Vec<ServerState>, ControlError> {
        Ok(Compose::ps(self).await?)
    }

    async fn reload(&self) -> Result<ReloadSummary, ControlError> {
        Ok(Compose::reload(self).await?)
    }

    async fn start_server(&self, server: &str) -> Result<(), ControlError> {
        Ok(self.start(server).await?)
    }

    async fn stop_server(&self, server: &str) -> Result<(), ControlError> {
        Ok(self.stop(server).await?)
    }

    async fn restart_server(&self, server: &str) -> Result<(), ControlError> {
        Ok(self.restart(server).await?)
    }
}
