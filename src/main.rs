//! Hostname provisioning relay.
//!
//! Accepts a hostname over HTTP, validates it, applies per-client and global
//! rate limits, and launches a job template or workflow on an automation
//! controller limited to that single host.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                      PROVISION RELAY                      │
//!                 │                                                           │
//!  POST /provision│  ┌────────────┐   ┌────────────┐   ┌──────────────────┐   │
//!  ───────────────┼─▶│ rate limit │──▶│  hostname  │──▶│ controller client│───┼──▶ GET  /api/v2/<collection>/?name=
//!                 │  │ middleware │   │ sanitizer  │   │ resolve + launch │───┼──▶ POST /api/v2/<collection>/<id>/launch/
//!                 │  └─────┬──────┘   └────────────┘   └──────────────────┘   │
//!                 │        │                                                  │
//!                 │        ▼                                                  │
//!                 │  ┌────────────┐                                           │
//!                 │  │ counters:  │  Redis if reachable at startup,           │
//!                 │  │ redis|mem  │  otherwise in-process                     │
//!                 │  └────────────┘                                           │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use provision_relay::config::{load_config, Environment};
use provision_relay::http::HttpServer;
use provision_relay::lifecycle::{self, Shutdown};
use provision_relay::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "provision-relay", version, about = "Relay hostname callbacks to an automation controller")]
struct Args {
    /// Optional TOML configuration file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start even if the configuration is invalid.
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if args.dev {
        config.environment = Environment::Development;
    }

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        "provision-relay starting"
    );

    if let Some(addr) = &config.observability.metrics_address {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(metrics_address = %addr, error = %e, "Failed to parse metrics address"),
        }
    }

    let prepared = lifecycle::prepare(config).await?;

    let listener = TcpListener::bind(&prepared.config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(prepared.config, prepared.launcher, prepared.limiter);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
