//! Process wiring: manifest, engine, activity and the two HTTP servers.

use std::path::PathBuf;
use std::sync::Arc;

use mcp_compose_core::{
    ActivityBus, ActivityBusConfig, ActivityPublisher, ActivityStore, ComposeControl,
    EnvOverrides, Manifest, WebhookPublisher,
};
use mcp_compose_gateway::{
    DashboardConfig, DashboardServer, DashboardState, ProxyConfig, ProxyServer, ProxyState,
};
use mcp_compose_orchestrator::Compose;
use mcp_compose_runtime::{ContainerRuntime, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CliResult;

pub struct App {
    pub manifest_path: PathBuf,
    pub env: EnvOverrides,
    pub manifest: Manifest,
    pub runtime: Arc<dyn ContainerRuntime>,
}

impl App {
    /// Read the manifest, apply the environment and pick an engine.
    pub async fn load(manifest_path: PathBuf, engine: Option<&str>) -> CliResult<Self> {
        let env = EnvOverrides::from_env()?;
        let mut manifest = Manifest::load(&manifest_path)?;
        manifest.apply_env(&env);

        let runtime = match engine {
            Some(name) => Runtime::from_name(name).ok_or_else(|| {
                mcp_compose_core::ConfigError::InvalidValue {
                    key: "engine".to_string(),
                    message: format!("unknown engine '{}' (docker, podman, none)", name),
                }
            })?,
            None => Runtime::detect().await,
        };
        info!(
            manifest = %manifest_path.display(),
            engine = runtime.engine(),
            servers = manifest.servers.len(),
            "[App] Loaded manifest"
        );

        Ok(Self {
            manifest_path,
            env,
            manifest,
            runtime: Arc::new(runtime),
        })
    }

    pub fn compose(&self, publisher: ActivityPublisher) -> CliResult<Arc<Compose>> {
        let compose = Compose::load(
            self.runtime.clone(),
            publisher,
            self.manifest_path.clone(),
            self.env.clone(),
        )?;
        Ok(Arc::new(compose))
    }

    /// This process owns the bus and the durable store.
    pub fn owned_activity(&self) -> Activity {
        let section = &self.manifest.activity;
        let store = open_store(section.database.clone());
        let config = ActivityBusConfig {
            mailbox_capacity: section.mailbox_capacity,
            replay_limit: section.replay_limit,
            ..Default::default()
        }
        .with_retention_days(section.retention_days);
        let bus = ActivityBus::start(config, store.clone());
        Activity {
            publisher: ActivityPublisher::Local(bus.clone()),
            store,
            bus: Some(bus),
        }
    }

    /// Detached proxy: events go to the dashboard's intake, audit reads use
    /// the store only when one is configured explicitly.
    pub fn remote_activity(&self) -> CliResult<Activity> {
        let section = &self.manifest.activity;
        let url = section.webhook_url.clone().or_else(|| {
            self.manifest
                .dashboard
                .enabled
                .then(|| format!("{}/api/activity", self.manifest.dashboard.base_url()))
        });
        let publisher = match url {
            Some(url) => {
                let webhook = WebhookPublisher::new(url, self.manifest.proxy.api_key.clone())
                    .map_err(anyhow::Error::from)?;
                info!(url = %webhook.url(), "[App] Publishing activity to dashboard");
                ActivityPublisher::Remote(webhook)
            }
            None => ActivityPublisher::Disabled,
        };
        let store = section
            .database
            .clone()
            .and_then(|path| open_store(Some(path)));
        Ok(Activity {
            publisher,
            store,
            bus: None,
        })
    }

    pub fn proxy_server(&self, compose: Arc<Compose>, activity: &Activity) -> CliResult<ProxyServer> {
        let control: Arc<dyn ComposeControl> = compose;
        let state = ProxyState::new(
            ProxyConfig::from_section(&self.manifest.proxy),
            self.runtime.clone(),
            control,
            activity.publisher.clone(),
            activity.store.clone(),
        )?;
        Ok(ProxyServer::new(state))
    }

    pub fn dashboard_server(&self, activity: &Activity) -> CliResult<DashboardServer> {
        let state = DashboardState::new(
            DashboardConfig::from_manifest(&self.manifest),
            self.runtime.clone(),
            activity.publisher.clone(),
            activity.store.clone(),
        )?;
        Ok(DashboardServer::new(state))
    }
}

/// Activity wiring for one process
pub struct Activity {
    pub publisher: ActivityPublisher,
    pub store: Option<Arc<dyn ActivityStore>>,
    bus: Option<ActivityBus>,
}

impl Activity {
    pub fn disabled() -> Self {
        Self {
            publisher: ActivityPublisher::Disabled,
            store: None,
            bus: None,
        }
    }

    /// Drain and stop the bus, if this process owns one.
    pub async fn shutdown(&self) {
        if let Some(bus) = &self.bus {
            bus.shutdown().await;
        }
    }
}

fn open_store(path: Option<PathBuf>) -> Option<Arc<dyn ActivityStore>> {
    match mcp_compose_storage::open_activity_store(path.as_deref()) {
        Ok(store) => Some(Arc::new(store) as Arc<dyn ActivityStore>),
        Err(e) => {
            warn!("[App] Activity store unavailable, continuing without history: {:#}", e);
            None
        }
    }
}

/// Cancelled on Ctrl-C (and SIGTERM on unix).
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("[App] Shutdown requested");
        trigger.cancel();
    });
    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
