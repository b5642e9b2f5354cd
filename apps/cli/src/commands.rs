//! Subcommand implementations

use futures::StreamExt;
use mcp_compose_core::{branding, clamp_tail, validate_server_name, ServerState, DEFAULT_TAIL};
use mcp_compose_orchestrator::UpSummary;
use mcp_compose_runtime::{LogEvent, LogOptions, LogSource};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::app::{shutdown_token, Activity, App};
use crate::error::CliResult;

pub async fn up(app: &App, servers: &[String]) -> CliResult<()> {
    let compose = app.compose(Activity::disabled().publisher)?;
    let summary = compose.up(servers).await?;
    print_up(&summary);
    Ok(())
}

fn print_up(summary: &UpSummary) {
    for server in &summary.started {
        println!("started  {}", server);
    }
    for server in &summary.already_running {
        println!("running  {}", server);
    }
    for (service, outcome) in &summary.services {
        let label = match outcome {
            mcp_compose_orchestrator::StartOutcome::Started => "started ",
            mcp_compose_orchestrator::StartOutcome::AlreadyRunning => "running ",
        };
        println!("{} {} (service)", label, service);
    }
}

pub async fn down(app: &App, servers: &[String]) -> CliResult<()> {
    let compose = app.compose(Activity::disabled().publisher)?;
    for server in compose.down(servers).await? {
        println!("stopped  {}", server);
    }
    Ok(())
}

pub async fn ps(app: &App, json: bool) -> CliResult<()> {
    let compose = app.compose(Activity::disabled().publisher)?;
    let mut states = compose.ps().await?;
    states.extend(compose.services_ps().await?);

    if json {
        let rendered = serde_json::to_string_pretty(&states).map_err(anyhow::Error::from)?;
        println!("{}", rendered);
    } else {
        print!("{}", render_table(&states));
    }
    Ok(())
}

fn render_table(states: &[ServerState]) -> String {
    let width = states
        .iter()
        .map(|s| s.server.len())
        .max()
        .unwrap_or(0)
        .max("SERVER".len());
    let container_width = states
        .iter()
        .map(|s| s.container.len())
        .max()
        .unwrap_or(0)
        .max("CONTAINER".len());

    let mut out = format!(
        "{:<width$}  {:<cw$}  {:<8}  {:<8}  {}\n",
        "SERVER",
        "CONTAINER",
        "STATUS",
        "PROTOCOL",
        "PORT",
        width = width,
        cw = container_width
    );
    for state in states {
        let protocol = match state.protocol {
            mcp_compose_core::Protocol::Http => "http",
            mcp_compose_core::Protocol::Stdio => "stdio",
        };
        let port = state
            .http_port
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<width$}  {:<cw$}  {:<8}  {:<8}  {}\n",
            state.server,
            state.container,
            state.status.as_str(),
            protocol,
            port,
            width = width,
            cw = container_width
        ));
    }
    out
}

pub async fn start(app: &App, server: &str) -> CliResult<()> {
    app.compose(Activity::disabled().publisher)?.start(server).await?;
    println!("started  {}", server);
    Ok(())
}

pub async fn stop(app: &App, server: &str) -> CliResult<()> {
    app.compose(Activity::disabled().publisher)?.stop(server).await?;
    println!("stopped  {}", server);
    Ok(())
}

pub async fn restart(app: &App, server: &str) -> CliResult<()> {
    app.compose(Activity::disabled().publisher)?.restart(server).await?;
    println!("restarted {}", server);
    Ok(())
}

/// `--tail` goes through the same clamp as the HTTP log endpoints.
fn log_options(follow: bool, tail: usize) -> LogOptions {
    LogOptions {
        follow,
        tail: Some(clamp_tail(Some(i64::try_from(tail).unwrap_or(i64::MAX)), DEFAULT_TAIL)),
        ..Default::default()
    }
}

/// Print a container's log; with `follow`, until the container stops or Ctrl-C.
pub async fn logs(app: &App, server: &str, follow: bool, tail: usize) -> CliResult<()> {
    validate_server_name(server)?;
    let options = log_options(follow, tail);
    let mut stream = app
        .runtime
        .logs(&branding::container_name(server), &options)
        .await?;
    let cancel = shutdown_token();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = stream.next() => match event {
                Some(LogEvent::Line { source: LogSource::Stdout, text }) => println!("{}", text),
                Some(LogEvent::Line { source: LogSource::Stderr, text }) => eprintln!("{}", text),
                Some(LogEvent::Ended { reason }) => {
                    if follow {
                        info!(server = %server, "[Logs] Stream ended: {}", reason);
                    }
                    break;
                }
                None => break,
            }
        }
    }
    Ok(())
}

/// Proxy only. Activity goes to the dashboard's intake.
pub async fn proxy(app: &App) -> CliResult<()> {
    let activity = app.remote_activity()?;
    let compose = app.compose(activity.publisher.clone())?;
    let server = app.proxy_server(compose, &activity)?;
    server.run(shutdown_token()).await?;
    Ok(())
}

/// Dashboard only. This process owns the activity bus.
pub async fn dashboard(app: &App) -> CliResult<()> {
    let activity = app.owned_activity();
    let result = app.dashboard_server(&activity)?.run(shutdown_token()).await;
    activity.shutdown().await;
    result?;
    Ok(())
}

/// `up`, then proxy and dashboard in one process sharing one bus.
pub async fn serve(app: &App) -> CliResult<()> {
    let activity = app.owned_activity();
    let compose = app.compose(activity.publisher.clone())?;

    match compose.up(&[]).await {
        Ok(summary) => print_up(&summary),
        Err(e) => error!("[Serve] Up incomplete, serving anyway: {}", e),
    }

    let cancel = shutdown_token();
    let proxy = app.proxy_server(compose, &activity)?;
    let mut tasks = vec![tokio::spawn(proxy.run(cancel.clone()))];
    if app.manifest.dashboard.enabled && !app.manifest.dashboard.containerized {
        let dashboard = app.dashboard_server(&activity)?;
        tasks.push(tokio::spawn(dashboard.run(cancel.clone())));
    }

    let result = join_servers(tasks, &cancel).await;
    activity.shutdown().await;
    result
}

/// Wait for every server; the first failure cancels the others.
async fn join_servers(
    tasks: Vec<tokio::task::JoinHandle<anyhow::Result<()>>>,
    cancel: &CancellationToken,
) -> CliResult<()> {
    let mut first_error = None;
    for task in tasks {
        let outcome = match task.await {
            Ok(result) => result,
            Err(join) => Err(anyhow::anyhow!("server task panicked: {}", join)),
        };
        if let Err(e) = outcome {
            error!("[Serve] Server exited: {:#}", e);
            cancel.cancel();
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
