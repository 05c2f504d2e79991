//! Portcullis Daemon
//!
//! Listens passively on the configured decoy ports and admits a command
//! session only for a source address that has completed the knock sequence.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portcullis_core::config::{self, DaemonConfig};
use portcullis_daemon::knock::KnockListener;
use portcullis_daemon::server::CommandGate;
use portcullis_daemon::DaemonState;

#[derive(Parser)]
#[command(name = "portcullisd")]
#[command(about = "Portcullis knock-gated command daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Portcullis daemon starting...");

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                DaemonConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            DaemonConfig::default()
        }
    };

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Knock sequence: {:?}, timeout: {}s, command port: {}",
        config.knock_sequence,
        config.knock_timeout.as_secs(),
        config.command_port
    );

    let state = Arc::new(DaemonState::new(config));

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    // One listener task per decoy port; a bind failure stops that port's
    // monitoring only
    for &port in &state.config.listen_ports {
        let listener = KnockListener::new(port, Arc::clone(&state), cancel.clone());
        tokio::spawn(async move {
            if let Err(e) = listener.run().await {
                tracing::error!("Knock listener on port {} stopped: {:#}", port, e);
            }
        });
    }

    // The command gate runs in the foreground; sessions are tracked so
    // shutdown can let them drain
    let sessions = TaskTracker::new();
    let gate = CommandGate::new(Arc::clone(&state), cancel.clone(), sessions.clone());
    gate.run().await?;

    // Graceful shutdown: no forced cancellation of sessions still draining
    sessions.close();
    let grace = state.config.shutdown_grace;
    tracing::info!("Waiting up to {}s for active sessions...", grace.as_secs());
    if tokio::time::timeout(grace, sessions.wait()).await.is_err() {
        tracing::warn!("Grace period elapsed with sessions still active");
    }

    tracing::info!("Daemon shutdown complete");
    Ok(())
}
