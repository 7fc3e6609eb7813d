//! quietsync CLI - watch a directory and mirror it to a remote after each
//! quiet period.
//!
//! Configuration comes from the environment (optionally a `.env` file),
//! with a few command line overrides.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use quietsync_sync::config::{ENV_LOCAL_PATH, ENV_QUIET_SECS, ENV_REMOTE_PATH};
use quietsync_sync::{
    ConnectivityProbe, DaemonConfig, DefaultDaemon, LoopExit, RcloneBackend, SyncBackend, TcpProbe,
};

#[derive(Parser)]
#[command(name = "quietsync")]
#[command(about = "quietsync - Sync a directory to a remote once it stops changing")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Load environment variables from this file instead of `./.env`.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Directory to watch (overrides SYNC_PATH_LOCAL).
    #[arg(short, long, global = true)]
    local: Option<PathBuf>,

    /// Remote destination (overrides SYNC_PATH_REMOTE).
    #[arg(short, long, global = true)]
    remote: Option<String>,

    /// Quiet interval in seconds (overrides SYNC_QUIET_SECS).
    #[arg(short, long, global = true)]
    quiet_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch and sync until interrupted (default).
    Run,

    /// Show the resolved configuration and check network and remote access.
    Check {
        /// Print the configuration as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG may come from the env file.
    load_env_file(cli.env_file.as_deref())?;
    init_logging(cli.verbose)?;

    let config = build_config(&cli).context("Invalid configuration")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(config).await,
        Commands::Check { json } => cmd_check(config, json).await,
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
        }
        None => {
            // A missing ./.env is fine; the environment may already be set.
            dotenv::dotenv().ok();
        }
    }
    Ok(())
}

/// Resolve configuration, letting command line values win over the environment.
fn build_config(cli: &Cli) -> quietsync_common::Result<DaemonConfig> {
    let local = cli.local.as_ref().map(|p| p.to_string_lossy().into_owned());
    let remote = cli.remote.clone();
    let quiet = cli.quiet_secs.map(|s| s.to_string());

    DaemonConfig::from_lookup(|key| match key {
        ENV_LOCAL_PATH if local.is_some() => local.clone(),
        ENV_REMOTE_PATH if remote.is_some() => remote.clone(),
        ENV_QUIET_SECS if quiet.is_some() => quiet.clone(),
        _ => std::env::var(key).ok(),
    })
}

/// Run the daemon until Ctrl-C / SIGTERM.
async fn cmd_run(config: DaemonConfig) -> Result<()> {
    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let exit = DefaultDaemon::from_config(config)
        .context("Invalid configuration")?
        .run(shutdown)
        .await
        .context("Failed to start watcher")?;

    // Every failure has been logged already; the exit code stays the same.
    if let LoopExit::Failed(_) = exit {
        info!("Exited after an unexpected error");
    }
    Ok(())
}

/// Print the resolved configuration and check connectivity and the remote.
async fn cmd_check(config: DaemonConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", config_json(&config)?);
    } else {
        println!("Configuration:");
        println!("  Watch directory: {}", config.watch);
        println!("  Remote target:   {}", config.remote);
        println!("  Quiet interval:  {:?}", config.quiet_interval);
        println!("  Watcher:         {:?}", config.watcher);
        println!("  rclone binary:   {}", config.rclone.binary);
    }

    let probe = TcpProbe::new(config.probe_addr.clone(), config.probe_timeout);
    if probe.is_reachable().await {
        println!("Network: {} is reachable", probe.addr());
    } else {
        println!("Network: {} is unreachable", probe.addr());
    }

    let backend = RcloneBackend::new(config.rclone.clone());
    backend
        .verify(&config.remote)
        .await
        .with_context(|| format!("Remote {} is not accessible", config.remote))?;
    println!("Remote: {} is accessible", config.remote);

    Ok(())
}

fn config_json(config: &DaemonConfig) -> Result<String> {
    serde_json::to_string_pretty(config).context("Failed to serialize configuration")
}

async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("KeyboardInterrupt, waiting to exit..."),
            Err(e) => {
                error!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
        },
        _ = terminate => info!("Terminated, waiting to exit..."),
    }

    token.cancel();
}
