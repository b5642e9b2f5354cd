//! Tracing setup: compact console output plus a daily rolling log file.

use std::path::{Path, PathBuf};

use mcp_compose_core::branding;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Used when RUST_LOG is unset. Crate names use underscores in targets.
const DEFAULT_FILTER: &str = "info,\
    mcp_compose=debug,\
    mcp_compose_core=debug,\
    mcp_compose_runtime=debug,\
    mcp_compose_storage=debug,\
    mcp_compose_mcp=debug,\
    mcp_compose_gateway=debug,\
    mcp_compose_orchestrator=debug,\
    hyper=warn,\
    reqwest=warn";

/// `~/.local/share/mcp-compose/logs` on Linux, the platform equivalent elsewhere.
pub fn default_logs_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(branding::CONTAINER_PREFIX)
        .join("logs")
}

/// Install the global subscriber. `verbose` raises the console to debug for
/// everything when RUST_LOG is unset. The returned guard flushes the file
/// writer and must live until exit.
pub fn init_tracing(logs_dir: &Path, verbose: bool) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)?;

    // Creates files like: mcp-compose.2026-01-22.log
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(branding::LOG_PREFIX)
        .filename_suffix("log")
        .build(logs_dir)?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
