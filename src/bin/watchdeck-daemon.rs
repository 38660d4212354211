// watchdeck daemon - Serves the instance registry over a Unix socket

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use watchdeck::config::DashboardConfig;
use watchdeck::daemon::{handle_command, PidFile};
use watchdeck::ipc::{Command, IpcServer};
use watchdeck::registry::InstanceRegistry;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Supervise URL monitor instances for the watchdeck CLI
#[derive(Debug, Parser)]
#[command(name = "watchdeck-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file (.toml or .json); defaults apply without one
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format)?;

    let config = match &args.config {
        Some(path) => DashboardConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => DashboardConfig::default(),
    };

    std::fs::create_dir_all(&config.log_dir).with_context(|| {
        format!(
            "failed to create log directory {}",
            config.log_dir.display()
        )
    })?;

    let pid_file = PidFile::new(&config.pid_file);
    pid_file.acquire().with_context(|| {
        format!("failed to claim PID file {}", pid_file.path().display())
    })?;

    let result = serve(&config).await;

    if let Err(e) = pid_file.remove() {
        warn!("Failed to remove PID file: {}", e);
    }

    result
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber.try_init(),
        LogFormat::Json => subscriber.json().try_init(),
    }
    .map_err(|e| anyhow!("failed to init tracing: {e}"))
}

/// Sweep the store, then answer requests until a shutdown signal arrives
///
/// Monitors keep running after the daemon exits; the next start-up sweep
/// picks up whichever of them are still alive.
async fn serve(config: &DashboardConfig) -> Result<()> {
    let registry = Arc::new(InstanceRegistry::from_config(config));
    registry.startup_sweep().await;

    let mut server = IpcServer::with_socket_path(&config.socket_path);
    server.start().context("failed to start IPC server")?;
    info!(
        "watchdeck daemon listening on {}",
        server.socket_path().display()
    );

    let handler = move |command: Command| {
        let registry = Arc::clone(&registry);
        async move { handle_command(&registry, command).await }
    };

    let result = tokio::select! {
        res = server.run(handler) => res.context("IPC server stopped"),
        res = shutdown_signal() => res,
    };

    if let Err(e) = server.stop() {
        warn!("Failed to stop IPC server: {}", e);
    }
    info!("watchdeck daemon stopped");

    result
}

async fn shutdown_signal() -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("Received SIGINT, shutting down"),
    }

    Ok(())
}
