//! Storefront edge router
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                   EDGE ROUTER                          │
//!                         │                                                        │
//!   Client Request        │  ┌──────────┐   ┌────────────┐   ┌─────────────────┐  │
//!   ──────────────────────┼─▶│  http    │──▶│ exclusions │──▶│    pipeline     │  │
//!                         │  │  server  │   │ (/_next..) │   │ host → limit →  │  │
//!                         │  └──────────┘   └─────┬──────┘   │ tenant → session│  │
//!                         │                       │          │ → directive     │  │
//!                         │                       │          └───────┬─────────┘  │
//!                         │                       ▼                  ▼            │
//!   Client Response       │               ┌─────────────────────────────────┐     │
//!   ◀─────────────────────┼───────────────│ reject / redirect / forward     │◀────┼── Upstream
//!                         │               │ + security headers + cookies    │     │   app
//!                         │               └─────────────────────────────────┘     │
//!                         │                                                        │
//!                         │  Cross-cutting: config (hot reload), store (memory /   │
//!                         │  redis), observability (tracing, prometheus), lifecycle│
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use storefront_edge::config::{load_startup_config, watcher::ConfigWatcher};
use storefront_edge::lifecycle::{build_components, wait_for_shutdown_signal, Shutdown};
use storefront_edge::observability::{logging, metrics};
use storefront_edge::HttpServer;

#[derive(Parser)]
#[command(name = "storefront-edge")]
#[command(about = "Multi-tenant storefront edge router", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_startup_config(args.config.as_deref())?;
    logging::init_tracing(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = config.environment.as_str(),
        root_domain = %config.tenancy.root_domain,
        upstream = %config.upstream.address,
        "storefront-edge starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let components = build_components(&config).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // The watcher stops delivering events once dropped, so hold it until exit.
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, components);
    let server_shutdown = shutdown.subscribe();

    let server_task = tokio::spawn(server.run(listener, config_updates, server_shutdown));

    wait_for_shutdown_signal().await;
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
