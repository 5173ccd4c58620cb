//! routesyncd - Calico block affinity route synchronization daemon
//!
//! Watches etcd for block affinity changes and installs or removes the
//! matching kernel routes. Runs until the watch stream ends or a signal
//! arrives.

use anyhow::Context;
use calico_routesyncd::{
    load_tls_options, EtcdWatchClient, IpRouteExecutor, RouteSync, RouteSyncConfig,
    DEFAULT_CONFIG_PATH,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Calico block affinity route synchronizer
#[derive(Parser, Debug)]
#[command(name = "routesyncd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// etcd connection config (JSON)
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting routesyncd ---");
    info!(config = %args.config.display(), "etcd config path");

    match run_daemon(&args).await {
        Ok(()) => {
            info!("routesyncd: exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("routesyncd: exiting with error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
}

async fn run_daemon(args: &Args) -> anyhow::Result<()> {
    let config = RouteSyncConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.validate()?;

    let tls = load_tls_options(&config).context("loading etcd client credentials")?;

    let source = EtcdWatchClient::connect(&config, tls)
        .await
        .context("connecting to etcd")?;
    let mut sync = RouteSync::new(source, IpRouteExecutor::new(config.ip_cmd.clone()));

    let stopped = tokio::select! {
        result = sync.run() => Some(result),
        _ = shutdown_signal() => None,
    };

    match stopped {
        Some(result) => result.context("watch loop"),
        None => {
            sync.shutdown().await;
            Ok(())
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("routesyncd: Received SIGINT"),
        _ = terminate => info!("routesyncd: Received SIGTERM"),
    }
}
