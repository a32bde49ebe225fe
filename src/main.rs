//! mx.dat game gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────────┐
//!                     │                        GATEWAY                           │
//!                     │                                                          │
//!   multipart POST    │  ┌───────────┐   ┌─────────┐   ┌──────────┐               │
//!   ──────────────────┼─▶│ multipart │──▶│  codec  │──▶│ protocol │               │
//!                     │  │ extractor │   │ decode  │   │ request  │               │
//!                     │  └───────────┘   └─────────┘   └────┬─────┘               │
//!                     │                                     │                     │
//!                     │  ┌───────────┐   ┌──────────────────▼──────┐              │
//!                     │  │  session  │──▶│ router: enrich, legacy  │──▶ handler   │
//!                     │  │   store   │   │ packet, unwrap reply    │◀── {protocol,│
//!                     │  └───────────┘   └──────────────────┬──────┘    packet}   │
//!                     │                                     │                     │
//!   encoded reply     │  ┌───────────┐   ┌─────────┐        │                     │
//!   ◀─────────────────┼──│  cookies  │◀──│  codec  │◀───────┘                     │
//!   + cookies         │  │           │   │ encode  │                              │
//!                     │  └───────────┘   └─────────┘                              │
//!                     │                                                          │
//!                     │  config · observability · lifecycle                      │
//!                     └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use mx_gateway::config::loader::{default_config, load_config};
use mx_gateway::handlers::builtin_registrations;
use mx_gateway::lifecycle::{spawn_signal_listener, Shutdown};
use mx_gateway::observability::{init_logging, metrics};
use mx_gateway::protocol::{InMemorySnapshotSink, ProtocolRegistry, ProtocolRouter};
use mx_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "mx-gateway", version, about = "mx.dat game gateway")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
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

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mx-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        gateway_path = %config.gateway.path,
        response_style = ?config.gateway.response_style,
        crypto_enabled = config.codec.crypto.enabled,
        compression_enabled = config.codec.compression.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = ProtocolRegistry::build(builtin_registrations())?;
    let router = ProtocolRouter::new(Arc::new(registry))
        .with_snapshot_sink(Arc::new(InMemorySnapshotSink::new()));

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let tls = config.listener.tls.clone();
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, router)?;

    match tls {
        Some(tls) => server.run_tls(listener.into_std()?, &tls, shutdown).await?,
        None => server.run(listener, shutdown).await?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
