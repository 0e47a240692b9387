//! beacon daemon - WebSocket signaling broker
//!
//! Hosts advertise a channel, participants join it, and the daemon relays
//! session offers and answers between them until either side disconnects.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (0.0.0.0:8765)
//! beacond
//!
//! # Start with a config file and a port override
//! beacond --config /etc/beacon/config.toml --port 9000
//!
//! # Keep connections open across malformed frames
//! beacond --decode-errors skip
//!
//! # Print the effective configuration and exit
//! beacond --print-config
//!
//! # Enable debug logging
//! RUST_LOG=beacond=debug beacond
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use beacond::config::{BrokerConfig, DecodeErrorPolicy};
use beacond::registry::spawn_registry;
use beacond::server::BeaconServer;

/// beacon daemon - signaling broker for peer-to-peer session setup
#[derive(Parser, Debug)]
#[command(name = "beacond", version, about)]
struct Args {
    /// Path to a TOML config file (falls back to $BEACON_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// Close connections idle for this many seconds (0 disables)
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// What to do with undecodable frames: "disconnect" or "skip"
    #[arg(long)]
    decode_errors: Option<DecodeErrorPolicy>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    /// Loads the config file (if any) and applies command line overrides.
    fn into_config(self) -> Result<BrokerConfig> {
        let mut config = match BrokerConfig::resolve_path(self.config.as_deref()) {
            Some(path) => BrokerConfig::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => BrokerConfig::default(),
        };

        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(secs) = self.idle_timeout {
            config.connection.idle_timeout_secs = secs;
        }
        if let Some(policy) = self.decode_errors {
            config.connection.decode_errors = policy;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let print_config = args.print_config;
    let config = args.into_config()?;

    if print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    run_daemon(config)
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: BrokerConfig) -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("beacond=info".parse()?)
                .add_directive("beacon_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "beacon daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // Spawn the connection registry
    let registry = spawn_registry();
    info!("Connection registry started");

    let addr = config.bind_address();
    let server = BeaconServer::new(config, registry, cancel_token);

    info!(addr = %addr, "Starting server");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("beacon daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
