//! `mcp-compose`: compose-style orchestration for MCP servers.
//!
//! ```text
//! mcp-compose [-f FILE] up [SERVERS..]     start servers (deps first) and services
//!                       down [SERVERS..]   stop and remove
//!                       ps                 status of servers and services
//!                       start|stop|restart SERVER
//!                       logs SERVER [-f] [--tail N]
//!                       proxy              MCP reverse proxy
//!                       dashboard          operator dashboard
//!                       serve              up + proxy + dashboard
//! ```

mod app;
mod commands;
mod error;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mcp_compose_core::{branding, DEFAULT_TAIL};
use tracing::{error, info};

use crate::app::App;
use crate::error::CliResult;

#[derive(Parser)]
#[command(name = "mcp-compose", version, about, long_about = None)]
struct Cli {
    /// Manifest file
    #[arg(short = 'f', long = "file", env = "MCP_COMPOSE_FILE", default_value = branding::DEFAULT_MANIFEST)]
    file: PathBuf,

    /// Container engine (docker, podman, none); detected when unset
    #[arg(long, env = "MCP_COMPOSE_ENGINE")]
    engine: Option<String>,

    /// Debug logging for every target (ignored when RUST_LOG is set)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start declared servers (all when none given) and enabled services
    Up { servers: Vec<String> },

    /// Stop and remove servers (everything when none given)
    Down { servers: Vec<String> },

    /// Show server and service status
    Ps {
        /// JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Start one server or service
    Start { server: String },

    /// Stop one server or service
    Stop { server: String },

    /// Restart one server or service
    Restart { server: String },

    /// Print a server's container log
    Logs {
        server: String,
        /// Keep streaming new lines
        #[arg(short = 'f', long)]
        follow: bool,
        /// Trailing lines to show (1-10000)
        #[arg(long, default_value_t = DEFAULT_TAIL)]
        tail: usize,
    },

    /// Run the MCP reverse proxy
    Proxy,

    /// Run the operator dashboard
    Dashboard,

    /// Bring everything up and run proxy and dashboard together
    Serve,
}

fn main() -> ExitCode {
    // .env before clap so `env = ...` defaults see it
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = match logging::init_tracing(&logging::default_logs_dir(), cli.verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging to file disabled: {}", e);
            None
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            return ExitCode::from(2);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    info!("{} v{}", branding::DISPLAY_NAME, env!("CARGO_PKG_VERSION"));
    let app = App::load(cli.file, cli.engine.as_deref()).await?;

    match cli.command {
        Command::Up { servers } => commands::up(&app, &servers).await,
        Command::Down { servers } => commands::down(&app, &servers).await,
        Command::Ps { json } => commands::ps(&app, json).await,
        Command::Start { server } => commands::start(&app, &server).await,
        Command::Stop { server } => commands::stop(&app, &server).await,
        Command::Restart { server } => commands::restart(&app, &server).await,
        Command::Logs {
            server,
            follow,
            tail,
        } => commands::logs(&app, &server, follow, tail).await,
        Command::Proxy => commands::proxy(&app).await,
        Command::Dashboard => commands::dashboard(&app).await,
        Command::Serve => commands::serve(&app).await,
    }
}
