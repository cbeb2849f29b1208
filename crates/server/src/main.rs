//! mountain server binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mountain_core::config::{AppConfig, default_search_dirs, search_config};
use mountain_server::bootstrap::build_state;
use mountain_server::create_router;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// mountain - A LuaRocks package repository server
#[derive(Parser, Debug)]
#[command(name = "mountain")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (searched in ./, ~/.mountain and /etc/mountain when absent)
    #[arg(short, long, env = "MOUNTAIN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Force debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the configured repositories
    Serve {
        /// Override `listen.address`
        #[arg(long)]
        address: Option<String>,
        /// Override `listen.port`
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => {
            println!("mountain {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Serve { address, port } => {
            let mut config = load_config(cli.config)?;
            if let Some(address) = address {
                config.listen.address = address;
            }
            if let Some(port) = port {
                config.listen.port = port;
            }
            serve(config, cli.debug).await
        }
    }
}

/// Load configuration from the given file, a discovered file, or the environment alone.
fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let path = path.or_else(|| search_config(&default_search_dirs()));
    AppConfig::load(path.as_deref()).context("failed to load configuration")
}

async fn serve(config: AppConfig, debug: bool) -> Result<()> {
    mountain_server::logging::init(&config.logs, debug)?;

    // Startup banner
    tracing::info!("mountain v{}", env!("CARGO_PKG_VERSION"));

    let warnings = config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    // Register Prometheus metrics
    mountain_server::metrics::register_metrics();

    let shutdown = CancellationToken::new();
    let bind_addr = config.listen.bind_addr();
    let state = build_state(config, &shutdown).await;

    if state.repositories.is_empty() {
        tracing::warn!("No repositories are being served");
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {bind_addr}"))?;
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM, cancelling every background refresh task.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
