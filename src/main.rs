//! Route-parameter HTTP relay.
//!
//! Accepts calls carrying a `route` query parameter and forwards them to a
//! single configured upstream, replaying the upstream's raw response.
//!
//! # Architecture Overview
//!
//! ```text
//!     Caller ──▶ http::server ──▶ security ──▶ http::context ──▶ http::forward
//!                                                                    │
//!                                                                    ▼
//!     Caller ◀── http::emitter ◀── http::response ◀── transport ◀── upstream
//!
//!     Cross-cutting: config (+ watcher), observability, lifecycle, resilience
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use route_relay::config::validation::validate_config;
use route_relay::config::watcher::ConfigWatcher;
use route_relay::config::{read_config, ConfigError, RelayConfig};
use route_relay::lifecycle::{shutdown_signal, Shutdown};
use route_relay::observability::{init_logging, init_metrics};
use route_relay::RelayServer;

#[derive(Parser, Debug, Clone)]
#[command(name = "route-relay", version, about = "Single-hop HTTP relay")]
struct Args {
    /// TOML configuration file; watched for changes while running.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream base address, overriding the config file.
    #[arg(short, long)]
    upstream: Option<String>,

    /// Listener address, overriding the config file.
    #[arg(short, long)]
    bind: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(upstream) = &self.upstream {
            config.upstream.base_address = upstream.clone();
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
    }

    fn resolve(&self, path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
        let mut config = match path {
            Some(path) => read_config(path)?,
            None => RelayConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = args.resolve(args.config.as_deref())?;

    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_address,
        transport = ?config.upstream.transport,
        "route-relay starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Reloaded files go through the same overrides as the startup config.
    let (update_tx, update_rx) = mpsc::unbounded_channel();
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut file_updates) = ConfigWatcher::new(path);
            let overrides = args.clone();
            tokio::spawn(async move {
                while let Some(mut next) = file_updates.recv().await {
                    overrides.apply(&mut next);
                    if let Err(errors) = validate_config(&next) {
                        let err = ConfigError::Validation(errors);
                        tracing::error!(error = %err, "Reloaded config is invalid, keeping current relay");
                        continue;
                    }
                    if update_tx.send(next).is_err() {
                        break;
                    }
                }
            });
            match watcher.run() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = RelayServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    server.run(listener, update_rx, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
