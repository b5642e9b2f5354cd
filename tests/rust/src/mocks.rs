//! In-memory container engine for integration tests
//!
//! [`MockRuntime`] keeps containers, networks and images in maps and records
//! every mutating call, so tests can assert both end state and ordering.
//! `exec` sessions are backed by an in-process JSON-RPC echo server.

use async_trait::async_trait;
use mcp_compose_core::{branding, BuildContext, WorkloadRecord, WorkloadSpec, WorkloadStatus};
use mcp_compose_runtime::{
    ContainerRuntime, EngineErrorKind, ExecSession, LogOptions, LogStream, RuntimeError,
    RuntimeResult,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Default)]
pub struct MockRuntime {
    containers: Mutex<BTreeMap<String, WorkloadRecord>>,
    specs: Mutex<BTreeMap<String, WorkloadSpec>>,
    networks: Mutex<BTreeSet<String>>,
    busy_networks: Mutex<BTreeSet<String>>,
    images: Mutex<BTreeSet<String>>,
    logs: Mutex<BTreeMap<String, Vec<String>>>,
    failing: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// A running container for `server`, as if started by an earlier `up`.
    pub fn with_running(self, server: &str) -> Self {
        self.with_status(server, WorkloadStatus::Running)
    }

    /// A container for `server` the engine reports in `status`.
    pub fn with_status(self, server: &str, status: WorkloadStatus) -> Self {
        let container = branding::container_name(server);
        let mut labels = BTreeMap::new();
        labels.insert(branding::LABEL_SERVER.to_string(), server.to_string());
        self.containers.lock().unwrap().insert(
            container.clone(),
            WorkloadRecord {
                id: format!("id-{}", container),
                name: container,
                status,
                image: Some("mock:latest".to_string()),
                labels,
                last_error: None,
            },
        );
        self
    }

    /// Log lines returned for `container`
    pub fn with_logs<I, S>(self, container: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.logs
            .lock()
            .unwrap()
            .insert(container.to_string(), lines.into_iter().map(Into::into).collect());
        self
    }

    /// Networks that report `Busy` on removal
    pub fn with_busy_network(self, network: &str) -> Self {
        self.busy_networks.lock().unwrap().insert(network.to_string());
        self
    }

    /// Make `start` fail for `server`.
    pub fn fail_start(&self, server: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(branding::container_name(server));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls starting with `prefix`, e.g. `"start "`
    pub fn calls_of(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn is_running(&self, container: &str) -> bool {
        self.containers
            .lock()
            .unwrap()
            .get(container)
            .is_some_and(|r| r.status == WorkloadStatus::Running)
    }

    pub fn spec(&self, container: &str) -> Option<WorkloadSpec> {
        self.specs.lock().unwrap().get(container).cloned()
    }

    pub fn has_network(&self, network: &str) -> bool {
        self.networks.lock().unwrap().contains(network)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    fn engine(&self) -> &'static str {
        "mock"
    }

    async fn start(&self, spec: &WorkloadSpec) -> RuntimeResult<String> {
        let name = spec.container_name();
        self.record(format!("start {}", name));
        if self.failing.lock().unwrap().contains(&name) {
            return Err(RuntimeError::new(
                EngineErrorKind::StartFailed,
                format!("{} exited with code 1", name),
            ));
        }
        let record = WorkloadRecord {
            id: format!("id-{}", name),
            name: name.clone(),
            status: WorkloadStatus::Running,
            image: Some(spec.image_ref()),
            labels: spec.labels.clone(),
            last_error: None,
        };
        self.containers.lock().unwrap().insert(name.clone(), record);
        self.specs.lock().unwrap().insert(name.clone(), spec.clone());
        Ok(format!("id-{}", name))
    }

    async fn stop(&self, name: &str) -> RuntimeResult<()> {
        self.record(format!("stop {}", name));
        self.containers.lock().unwrap().remove(name);
        self.specs.lock().unwrap().remove(name);
        Ok(())
    }

    async fn remove(&self, name: &str) -> RuntimeResult<()> {
        self.containers.lock().unwrap().remove(name);
        self.specs.lock().unwrap().remove(name);
        Ok(())
    }

    async fn status(&self, name: &str) -> RuntimeResult<WorkloadStatus> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .get(name)
            .map(|r| r.status)
            .unwrap_or(WorkloadStatus::Stopped))
    }

    async fn inspect(&self, name: &str) -> RuntimeResult<Option<WorkloadRecord>> {
        Ok(self.containers.lock().unwrap().get(name).cloned())
    }

    async fn list(&self, prefix: &str) -> RuntimeResult<Vec<WorkloadRecord>> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn logs(&self, name: &str, _options: &LogOptions) -> RuntimeResult<LogStream> {
        let lines = self.logs.lock().unwrap().get(name).cloned();
        match lines {
            Some(lines) => Ok(LogStream::from_lines(lines, "container stopped")),
            None => Err(RuntimeError::new(
                EngineErrorKind::NotFound,
                format!("No such container: {}", name),
            )),
        }
    }

    async fn stats(&self, name: &str) -> RuntimeResult<Value> {
        if !self.is_running(name) {
            return Err(RuntimeError::new(
                EngineErrorKind::NotFound,
                format!("No such container: {}", name),
            ));
        }
        Ok(json!({ "name": name, "cpu_percent": 1.5, "memory_usage": "12MiB" }))
    }

    async fn network_exists(&self, name: &str) -> RuntimeResult<bool> {
        Ok(self.networks.lock().unwrap().contains(name))
    }

    async fn network_create(&self, name: &str, driver: &str) -> RuntimeResult<()> {
        self.record(format!("network {} {}", name, driver));
        self.networks.lock().unwrap().insert(name.to_string());
        Ok(())
    }

    async fn network_remove(&self, name: &str) -> RuntimeResult<()> {
        if self.busy_networks.lock().unwrap().contains(name) {
            return Err(RuntimeError::new(
                EngineErrorKind::Busy,
                format!("network {} has active endpoints", name),
            ));
        }
        self.record(format!("network-rm {}", name));
        self.networks.lock().unwrap().remove(name);
        Ok(())
    }

    async fn connect_network(&self, network: &str, name: &str) -> RuntimeResult<()> {
        self.record(format!("connect {} {}", network, name));
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> RuntimeResult<bool> {
        Ok(self.images.lock().unwrap().contains(image))
    }

    async fn build_image(&self, _build: &BuildContext, tag: &str) -> RuntimeResult<()> {
        self.record(format!("build {}", tag));
        self.images.lock().unwrap().insert(tag.to_string());
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> RuntimeResult<()> {
        self.record(format!("pull {}", image));
        self.images.lock().unwrap().insert(image.to_string());
        Ok(())
    }

    async fn exec(
        &self,
        name: &str,
        command: &[String],
        _interactive: bool,
    ) -> RuntimeResult<ExecSession> {
        if !self.is_running(name) {
            return Err(RuntimeError::new(
                EngineErrorKind::ExecFailed,
                format!("container {} is not running", name),
            ));
        }
        self.record(format!("exec {} {}", name, command.join(" ")));
        Ok(echo_session())
    }
}

/// Exec session answering each request line with
/// `{"result": {"method": <method>}}`. Notifications get no reply; a log line
/// is written before every response.
pub fn echo_session() -> ExecSession {
    let (stdin_ours, stdin_theirs) = tokio::io::duplex(64 * 1024);
    let (stdout_theirs, stdout_ours) = tokio::io::duplex(64 * 1024);

    tokio::spawn(async move {
        let mut lines = BufReader::new(stdin_theirs).lines();
        let mut out = stdout_theirs;
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(message) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            let messages = match message {
                Value::Array(batch) => batch,
                single => vec![single],
            };
            for message in messages {
                let Some(id) = message.get("id").cloned() else {
                    continue;
                };
                let method = message.get("method").cloned().unwrap_or(Value::Null);
                let response = json!({ "jsonrpc": "2.0", "id": id, "result": { "method": method } });
                let framed = format!("server log: handling request\n{}\n", response);
                if out.write_all(framed.as_bytes()).await.is_err() {
                    return;
                }
            }
        }
    });

    ExecSession::from_streams(stdin_ours, stdout_ours)
}
