//! CLI engine driver
//!
//! Drives `docker` or `podman` as child processes. Both engines accept the
//! same flags for everything we use, so one implementation serves both;
//! only the binary differs.

use async_trait::async_trait;
use mcp_compose_core::{BuildContext, WorkloadRecord, WorkloadSpec, WorkloadStatus};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::driver::ContainerRuntime;
use crate::error::{tail_lines, EngineErrorKind, RuntimeError, RuntimeResult};
use crate::exec::{ExecHandle, ExecSession};
use crate::logs::{LogEvent, LogOptions, LogSource, LogStream};

/// Lines of engine stderr kept in errors
const STDERR_TAIL_LINES: usize = 20;

/// Lines of container log captured when `run` fails
const FAILED_START_LOG_LINES: usize = 50;

/// Which engine CLI to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Docker,
    Podman,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

/// Per-command deadlines
#[derive(Debug, Clone)]
pub struct EngineTimeouts {
    /// Inspect, run, stop, network operations
    pub command: Duration,
    /// Build and pull
    pub long: Duration,
    /// Pause after `run` before re-inspecting status
    pub settle: Duration,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            command: Duration::from_secs(30),
            long: Duration::from_secs(120),
            settle: Duration::from_secs(1),
        }
    }
}

/// Captured output of one engine invocation
#[derive(Debug)]
struct CommandOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn failure(&self, kind: EngineErrorKind, what: &str) -> RuntimeError {
        let status = match self.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        };
        RuntimeError::new(kind, format!("{what}: {status}"))
            .with_stderr(tail_lines(&self.stderr, STDERR_TAIL_LINES))
    }

    fn stderr_matches(&self, needles: &[&str]) -> bool {
        let stderr = self.stderr.to_lowercase();
        needles.iter().any(|n| stderr.contains(n))
    }

    fn is_not_found(&self) -> bool {
        self.stderr_matches(&["no such", "not found", "no container with name"])
    }
}

/// Container engine driven through its CLI
#[derive(Debug, Clone)]
pub struct CliRuntime {
    kind: EngineKind,
    binary: PathBuf,
    timeouts: EngineTimeouts,
}

impl CliRuntime {
    pub fn new(kind: EngineKind) -> Self {
        Self::with_binary(kind, kind.as_str())
    }

    /// Use a specific binary (absolute path or name on PATH).
    pub fn with_binary(kind: EngineKind, binary: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            binary: binary.into(),
            timeouts: EngineTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: EngineTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Whether the engine answers `version` (binary present and daemon up).
    pub async fn probe(&self) -> bool {
        let args = vec!["version".to_string()];
        match self.run_engine(&args, Duration::from_secs(5)).await {
            Ok(out) => out.success,
            Err(_) => false,
        }
    }

    async fn run_engine(&self, args: &[String], timeout: Duration) -> RuntimeResult<CommandOutput> {
        debug!(engine = self.kind.as_str(), ?args, "[Runtime] exec");
        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RuntimeError::engine_absent());
            }
            Ok(Err(e)) => {
                return Err(RuntimeError::new(
                    EngineErrorKind::InspectFailed,
                    format!("failed to run {}: {}", self.kind.as_str(), e),
                ))
            }
            Err(_) => {
                return Err(RuntimeError::new(
                    EngineErrorKind::Timeout,
                    format!(
                        "{} {} timed out after {:?}",
                        self.kind.as_str(),
                        args.first().map(String::as_str).unwrap_or_default(),
                        timeout
                    ),
                ))
            }
        };

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run(&self, args: Vec<String>) -> RuntimeResult<CommandOutput> {
        self.run_engine(&args, self.timeouts.command).await
    }

    /// Best-effort log tail (stdout and stderr merged) for diagnostics.
    async fn log_tail(&self, name: &str, lines: usize) -> String {
        let args = args(["logs", "--tail", &lines.to_string(), name]);
        match self.run(args).await {
            Ok(out) => {
                let mut text = out.stdout;
                text.push_str(&out.stderr);
                tail_lines(&text, lines)
            }
            Err(_) => String::new(),
        }
    }

    async fn ensure_network(&self, network: &str) -> RuntimeResult<()> {
        if self.network_exists(network).await? {
            return Ok(());
        }
        info!(network, "[Runtime] Creating network");
        self.network_create(network, mcp_compose_core::branding::DEFAULT_NETWORK_DRIVER)
            .await
    }

    async fn inspect_many(&self, names: &[String]) -> RuntimeResult<Vec<WorkloadRecord>> {
        let mut argv = args(["inspect", "--type", "container"]);
        argv.extend(names.iter().cloned());
        let out = self.run(argv).await?;
        if !out.success {
            if out.is_not_found() && names.len() == 1 {
                return Ok(Vec::new());
            }
            // Partial results are still printed when only some names vanished
            if out.stdout.trim().is_empty() {
                return Err(out.failure(EngineErrorKind::InspectFailed, "inspect"));
            }
        }
        parse_inspect(&out.stdout)
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    fn engine(&self) -> &'static str {
        self.kind.as_str()
    }

    async fn start(&self, spec: &WorkloadSpec) -> RuntimeResult<String> {
        let name = spec.container_name();
        let image = spec.image_ref();

        if let Some(existing) = self.inspect(&name).await? {
            info!(
                container = %name,
                status = %existing.status,
                "[Runtime] Replacing existing container"
            );
            let _ = self.run(args(["stop", name.as_str()])).await;
            let _ = self.run(args(["rm", "-f", name.as_str()])).await;
        }

        if let Some(build) = &spec.build {
            self.build_image(build, &image).await?;
        } else if spec.pull {
            self.pull_image(&image).await?;
        }

        if spec.primary_network_is_managed() {
            self.ensure_network(&spec.primary_network()).await?;
        }

        let argv = run_args(spec);
        info!(container = %name, image = %image, "[Runtime] Starting container");
        let out = match self.run(argv).await {
            Ok(out) => out,
            Err(e) if e.kind == EngineErrorKind::Timeout => {
                // the engine may have created the container before we gave up
                let _ = self.run(args(["rm", "-f", name.as_str()])).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        if !out.success {
            let logs = self.log_tail(&name, FAILED_START_LOG_LINES).await;
            let _ = self.run(args(["rm", "-f", name.as_str()])).await;
            let mut err = out.failure(EngineErrorKind::StartFailed, &format!("run {name}"));
            if !logs.trim().is_empty() {
                err.message = format!("{}; container log:\n{}", err.message, logs);
            }
            return Err(err);
        }
        let id = out.stdout.trim().to_string();

        for network in spec.additional_networks() {
            if let Err(e) = self.connect_network(&network, &name).await {
                warn!(container = %name, network = %network, "[Runtime] Failed to attach network: {}", e);
            }
        }

        if !self.timeouts.settle.is_zero() {
            tokio::time::sleep(self.timeouts.settle).await;
        }
        match self.status(&name).await {
            Ok(WorkloadStatus::Running) => {}
            Ok(status) => {
                let logs = self.log_tail(&name, STDERR_TAIL_LINES).await;
                warn!(container = %name, %status, "[Runtime] Container not running after start:\n{}", logs);
            }
            Err(e) => warn!(container = %name, "[Runtime] Could not re-inspect after start: {}", e),
        }

        Ok(id)
    }

    async fn stop(&self, name: &str) -> RuntimeResult<()> {
        match self.inspect(name).await {
            Ok(None) => {
                debug!(container = name, "[Runtime] Already absent");
                return Ok(());
            }
            Ok(Some(_)) => {}
            Err(e) if e.is_engine_absent() => return Err(e),
            Err(e) => warn!(container = name, "[Runtime] Inspect before stop failed: {}", e),
        }

        match self.run(args(["stop", name])).await {
            Ok(out) if !out.success => {
                warn!(container = name, "[Runtime] stop failed: {}", out.stderr.trim())
            }
            Err(e) => warn!(container = name, "[Runtime] stop failed: {}", e),
            Ok(_) => {}
        }

        let out = self.run(args(["rm", "-f", name])).await?;
        if !out.success && !out.is_not_found() {
            return Err(out.failure(EngineErrorKind::StopFailed, &format!("rm {name}")));
        }
        info!(container = name, "[Runtime] Stopped");
        Ok(())
    }

    async fn remove(&self, name: &str) -> RuntimeResult<()> {
        let out = self.run(args(["rm", "-f", name])).await?;
        if !out.success && !out.is_not_found() {
            return Err(out.failure(EngineErrorKind::StopFailed, &format!("rm {name}")));
        }
        Ok(())
    }

    async fn status(&self, name: &str) -> RuntimeResult<WorkloadStatus> {
        Ok(self
            .inspect(name)
            .await?
            .map(|r| r.status)
            .unwrap_or(WorkloadStatus::Stopped))
    }

    async fn inspect(&self, name: &str) -> RuntimeResult<Option<WorkloadRecord>> {
        let records = self.inspect_many(&[name.to_string()]).await?;
        Ok(records.into_iter().find(|r| r.name == name))
    }

    async fn list(&self, prefix: &str) -> RuntimeResult<Vec<WorkloadRecord>> {
        let filter = format!("name={prefix}");
        let out = self
            .run(args(["ps", "-a", "--filter", &filter, "--format", "{{.Names}}"]))
            .await?;
        if !out.success {
            return Err(out.failure(EngineErrorKind::InspectFailed, "ps"));
        }
        let names: Vec<String> = out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|n| n.starts_with(prefix))
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut records = self.inspect_many(&names).await?;
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn logs(&self, name: &str, options: &LogOptions) -> RuntimeResult<LogStream> {
        let mut argv = vec!["logs".to_string()];
        argv.extend(options.to_args());
        argv.push(name.to_string());

        let mut child = Command::new(&self.binary)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::engine_absent()
                } else {
                    RuntimeError::new(EngineErrorKind::InspectFailed, format!("logs {name}: {e}"))
                }
            })?;

        let (tx, mut rx) = mpsc::channel::<LogEvent>(256);
        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(pump_lines(out, LogSource::Stdout, tx.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(pump_lines(err, LogSource::Stderr, tx.clone())));

        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();
        let container = name.to_string();
        tokio::spawn(async move {
            let finished = async {
                if let Some(task) = stdout_task {
                    let _ = task.await;
                }
                if let Some(task) = stderr_task {
                    let _ = task.await;
                }
                child.wait().await
            };
            let reason = tokio::select! {
                _ = cancel.cancelled() => None,
                status = finished => Some(match status {
                    Ok(s) if s.success() => "container log stream closed".to_string(),
                    Ok(s) => format!("engine exited with {s}"),
                    Err(e) => e.to_string(),
                }),
            };
            match reason {
                Some(reason) => {
                    debug!(container = %container, %reason, "[Runtime] Log stream ended");
                    let _ = tx.send(LogEvent::Ended { reason }).await;
                }
                None => {
                    let _ = child.kill().await;
                    debug!(container = %container, "[Runtime] Log stream cancelled");
                }
            }
        });

        let stream = async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        };
        Ok(LogStream::new(stream, Some(guard)))
    }

    async fn stats(&self, name: &str) -> RuntimeResult<serde_json::Value> {
        let out = self
            .run(args(["stats", "--no-stream", "--format", "{{json .}}", name]))
            .await?;
        if !out.success {
            let kind = if out.is_not_found() {
                EngineErrorKind::NotFound
            } else {
                EngineErrorKind::InspectFailed
            };
            return Err(out.failure(kind, &format!("stats {name}")));
        }
        let line = out.stdout.lines().find(|l| !l.trim().is_empty()).unwrap_or("{}");
        serde_json::from_str(line).map_err(|e| {
            RuntimeError::new(EngineErrorKind::InspectFailed, format!("unparseable stats: {e}"))
        })
    }

    async fn network_exists(&self, name: &str) -> RuntimeResult<bool> {
        let out = self.run(args(["network", "ls", "--format", "{{.Name}}"])).await?;
        if !out.success {
            return Err(out.failure(EngineErrorKind::NetworkFailed, "network ls"));
        }
        Ok(out.stdout.lines().any(|l| l.trim() == name))
    }

    async fn network_create(&self, name: &str, driver: &str) -> RuntimeResult<()> {
        let out = self
            .run(args(["network", "create", "--driver", driver, name]))
            .await?;
        if !out.success && !out.stderr_matches(&["already exists"]) {
            return Err(out.failure(EngineErrorKind::NetworkFailed, &format!("network create {name}")));
        }
        Ok(())
    }

    async fn network_remove(&self, name: &str) -> RuntimeResult<()> {
        let out = self.run(args(["network", "rm", name])).await?;
        if out.success || out.is_not_found() {
            return Ok(());
        }
        let kind = if out.stderr_matches(&["in use", "active endpoints", "has active"]) {
            EngineErrorKind::Busy
        } else {
            EngineErrorKind::NetworkFailed
        };
        Err(out.failure(kind, &format!("network rm {name}")))
    }

    async fn connect_network(&self, network: &str, name: &str) -> RuntimeResult<()> {
        let out = self.run(args(["network", "connect", network, name])).await?;
        if !out.success && !out.stderr_matches(&["already exists", "already attached", "already connected"]) {
            return Err(out.failure(
                EngineErrorKind::NetworkFailed,
                &format!("network connect {network} {name}"),
            ));
        }
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> RuntimeResult<bool> {
        let out = self.run(args(["image", "inspect", image])).await?;
        if out.success {
            Ok(true)
        } else if out.is_not_found() || out.stderr.trim().is_empty() {
            Ok(false)
        } else {
            Err(out.failure(EngineErrorKind::InspectFailed, &format!("image inspect {image}")))
        }
    }

    async fn build_image(&self, build: &BuildContext, tag: &str) -> RuntimeResult<()> {
        let dockerfile = build.dockerfile_path();
        if tokio::fs::metadata(&dockerfile).await.is_err() {
            return Err(RuntimeError::new(
                EngineErrorKind::BuildFailed,
                format!("dockerfile not found: {}", dockerfile.display()),
            ));
        }
        info!(tag, context = %build.context.display(), "[Runtime] Building image");
        let out = self.run_engine(&build_args(build, tag), self.timeouts.long).await?;
        if !out.success {
            return Err(out.failure(EngineErrorKind::BuildFailed, &format!("build {tag}")));
        }
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> RuntimeResult<()> {
        info!(image, "[Runtime] Pulling image");
        let out = self.run_engine(&args(["pull", image]), self.timeouts.long).await?;
        if !out.success {
            return Err(out.failure(EngineErrorKind::PullFailed, &format!("pull {image}")));
        }
        Ok(())
    }

    async fn exec(
        &self,
        name: &str,
        command: &[String],
        interactive: bool,
    ) -> RuntimeResult<ExecSession> {
        let mut argv = vec!["exec".to_string()];
        if interactive {
            argv.push("-i".to_string());
        }
        argv.push(name.to_string());
        argv.extend(command.iter().cloned());

        let mut child = Command::new(&self.binary)
            .args(&argv)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::engine_absent()
                } else {
                    RuntimeError::new(EngineErrorKind::ExecFailed, format!("exec {name}: {e}"))
                }
            })?;

        let missing = || RuntimeError::new(EngineErrorKind::ExecFailed, "exec pipes unavailable");
        let stdin = child.stdin.take().ok_or_else(missing)?;
        let stdout = child.stdout.take().ok_or_else(missing)?;
        debug!(container = name, ?command, "[Runtime] exec session opened");
        Ok(ExecSession {
            stdin: Box::pin(stdin),
            stdout: Box::pin(stdout),
            handle: ExecHandle::new(child),
        })
    }
}

async fn pump_lines<R>(reader: R, source: LogSource, tx: mpsc::Sender<LogEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(text)) = lines.next_line().await {
        if tx.send(LogEvent::Line { source, text }).await.is_err() {
            break;
        }
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Compose the `run` argv for a spec.
pub fn run_args(spec: &WorkloadSpec) -> Vec<String> {
    let mut argv = args(["run", "-d", "--name"]);
    argv.push(spec.container_name());
    if spec.interactive {
        argv.push("-i".to_string());
    }
    if let Some(restart) = spec.restart {
        argv.push("--restart".to_string());
        argv.push(restart.as_arg().to_string());
    }
    for (key, value) in &spec.env {
        argv.push("-e".to_string());
        argv.push(format!("{key}={value}"));
    }
    for port in &spec.ports {
        argv.push("-p".to_string());
        argv.push(port.clone());
    }
    for volume in &spec.volumes {
        argv.push("-v".to_string());
        argv.push(volume.clone());
    }
    if let Some(workdir) = &spec.workdir {
        argv.push("-w".to_string());
        argv.push(workdir.clone());
    }
    argv.push("--network".to_string());
    argv.push(spec.primary_network());

    if let Some(cpus) = spec.resources.cpus {
        argv.push("--cpus".to_string());
        argv.push(cpus.to_string());
    }
    if let Some(memory) = &spec.resources.memory {
        argv.push("--memory".to_string());
        argv.push(memory.clone());
    }

    let security = &spec.security;
    for cap in &security.cap_add {
        argv.push("--cap-add".to_string());
        argv.push(cap.clone());
    }
    for cap in &security.cap_drop {
        argv.push("--cap-drop".to_string());
        argv.push(cap.clone());
    }
    if security.no_new_privileges {
        argv.push("--security-opt".to_string());
        argv.push("no-new-privileges".to_string());
    }
    if security.read_only {
        argv.push("--read-only".to_string());
    }
    if let Some(user) = &security.user {
        argv.push("--user".to_string());
        argv.push(user.clone());
    }

    for (key, value) in &spec.labels {
        argv.push("--label".to_string());
        argv.push(format!("{key}={value}"));
    }

    argv.push(spec.image_ref());
    argv.extend(spec.command.iter().cloned());
    argv.extend(spec.args.iter().cloned());
    argv
}

/// Compose the `build` argv.
pub fn build_args(build: &BuildContext, tag: &str) -> Vec<String> {
    let mut argv = args(["build", "-t", tag, "-f"]);
    argv.push(build.dockerfile_path().display().to_string());
    for (key, value) in &build.args {
        argv.push("--build-arg".to_string());
        argv.push(format!("{key}={value}"));
    }
    argv.push(build.context.display().to_string());
    argv
}

#[derive(Debug, Deserialize)]
struct InspectEntry {
    #[serde(rename = "Id", alias = "ID", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "State", default)]
    state: InspectState,
    #[serde(rename = "Config", default)]
    config: InspectConfig,
    #[serde(rename = "ImageName", default)]
    image_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InspectState {
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Error", default)]
    error: String,
}

#[derive(Debug, Default, Deserialize)]
struct InspectConfig {
    #[serde(rename = "Image", default)]
    image: Option<String>,
    #[serde(rename = "Labels", default)]
    labels: Option<BTreeMap<String, String>>,
}

/// Parse `inspect` output (a JSON array) into records.
fn parse_inspect(json: &str) -> RuntimeResult<Vec<WorkloadRecord>> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<InspectEntry> = serde_json::from_str(json).map_err(|e| {
        RuntimeError::new(EngineErrorKind::InspectFailed, format!("unparseable inspect output: {e}"))
    })?;
    Ok(entries
        .into_iter()
        .map(|entry| WorkloadRecord {
            id: entry.id,
            name: entry.name.trim_start_matches('/').to_string(),
            status: WorkloadStatus::from_engine(&entry.state.status),
            image: entry.config.image.or(entry.image_name),
            labels: entry.config.labels.unwrap_or_default(),
            last_error: Some(entry.state.error).filter(|e| !e.is_empty()),
        })
        .collect())
}
