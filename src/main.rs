//! Orion gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ correlation ─▶ internal trust ─▶ authentication ─▶ forward ─▶ Backend
//!                        │                                 │               │
//!                        │                                 ▼               ▼
//!                        │                          token authority   circuit breaker
//!                        │                                                 │
//!     Client Response    ▼                                                 ▼
//!     ◀───────────── error envelopes ◀──────────────────────────────── fallback
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use orion_gateway::config::{default_config, load_config, PLACEHOLDER_SECRET};
use orion_gateway::lifecycle::{wait_for_signal, Shutdown};
use orion_gateway::observability::{logging, metrics};
use orion_gateway::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "orion-gateway", version, about = "Request-admission gateway")]
struct Args {
    /// Path to the TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };

    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "orion-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        gateway = %config.gateway.name,
        authority = %config.authority.validation_url,
        routes = config.routes.len(),
        backend_groups = config.backend_groups.len(),
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );
    if config.trust.service_token == PLACEHOLDER_SECRET {
        tracing::warn!("Using the placeholder service token; set GATEWAY_SERVICE_TOKEN in production");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        tracing::info!(signal, "Termination signal received");
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
