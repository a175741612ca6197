//! Icecast integration gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!   Icecast / source clients
//!        │
//!        ▼
//!   ┌──────────┐   ┌──────────┐   ┌────────┐   ┌──────────────┐
//!   │   net    │──▶│  compat  │──▶│  http  │──▶│   webhook    │
//!   │ listener │   │ ICE/1.0  │   │ server │   │ join / leave │
//!   └──────────┘   └──────────┘   └────────┘   └──────┬───────┘
//!                                                      ▼
//!                   ┌──────────────┐   reads    ┌────────────┐
//!                   │ listen log   │◀───────────│  Recorder  │
//!                   │ job, status  │            └────────────┘
//!                   └──────┬───────┘
//!                          ▼
//!                   storage registry
//! ```
//!
//! This file is the composition root: every component is constructed here
//! and handed its dependencies explicitly.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use radio_gateway::config::{load_config, GatewayConfig};
use radio_gateway::http::HttpServer;
use radio_gateway::jobs::ListenLogJob;
use radio_gateway::lifecycle::{signals, Shutdown};
use radio_gateway::net::BoundedListener;
use radio_gateway::observability::{logging, metrics};
use radio_gateway::storage::StorageRegistry;
use radio_gateway::tracker::Recorder;

#[derive(Parser)]
#[command(name = "radio-gateway", version)]
#[command(about = "Icecast listener tracking and legacy source-client gateway")]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "RADIO_GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = ?args.config,
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        "radio-gateway starting"
    );

    if config.observability.metrics_enabled {
        // Validation already checked the address.
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    let recorder = Arc::new(Recorder::new(&config.tracker));

    let mut jobs = Vec::new();
    if config.listen_log.enabled {
        let registry = StorageRegistry::with_builtin()?;
        let storage = registry.open(&config.listen_log)?;
        let job = ListenLogJob::new(Arc::clone(&recorder), storage, &config.listen_log);
        jobs.push(tokio::spawn(job.run(shutdown.subscribe())));
    }

    let listener = BoundedListener::bind(&config.listener).await?;
    let server = HttpServer::new(config, Arc::clone(&recorder));
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::wait_for_signal().await;
    shutdown.trigger();

    server_task.await??;
    for job in jobs {
        job.await?;
    }

    tracing::info!(listeners = recorder.listener_amount(), "Shutdown complete");
    Ok(())
}
