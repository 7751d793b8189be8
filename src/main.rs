//! Repository routing service.
//!
//! # Architecture Overview
//!
//! ```text
//!   config (TOML, hot reload)
//!       │
//!       ▼
//!   repository registry ──events──▶ routing manager ──▶ keyed executor
//!       │                                │                 │
//!       │                                │                 ├─ local crawl (storage)
//!       │                                │                 └─ remote strategies (HTTP)
//!       │                                ▼
//!       │                         prefix files (storage) ──▶ GET /repositories/{id}/.meta/prefixes.txt
//!       │                                │
//!       │                         published events
//!       │                                ▼
//!       └──────────────────────▶ admission filter ◀── admin API / proxies
//! ```

use std::path::PathBuf;
use std::time::Duration;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use repo_routing::config::watcher::ConfigWatcher;
use repo_routing::config::{load_config, RouterConfig};
use repo_routing::lifecycle::{wait_for_signal, Services};
use repo_routing::observability::{logging, metrics};
use repo_routing::HttpServer;

#[derive(Parser)]
#[command(name = "repo-routing")]
#[command(about = "Automatic routing for hosted, proxy and group repositories", long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "routing.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_exists = args.config.exists();
    let config = if config_exists {
        load_config(&args.config)?
    } else {
        RouterConfig::default()
    };

    logging::init_tracing(&config.observability.log_level);
    tracing::info!("repo-routing v{} starting", env!("CARGO_PKG_VERSION"));
    if !config_exists {
        tracing::warn!(path = ?args.config, "Configuration file not found, using defaults");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routing_enabled = config.routing.enabled,
        repositories = config.repositories.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let services = Arc::new(Services::start(&config, tokio::runtime::Handle::current())?);

    // keep the watcher alive for the process lifetime
    let _watcher = if config_exists {
        let (watcher, mut updates) = ConfigWatcher::new(&args.config);
        let reloading = services.clone();
        tokio::spawn(async move {
            while let Some(new_config) = updates.recv().await {
                if let Err(e) = reloading.reload(&new_config) {
                    tracing::error!(error = %e, "Failed to apply reloaded configuration");
                }
            }
        });
        match watcher.run() {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::error!(error = %e, "Config watcher unavailable, hot reload disabled");
                None
            }
        }
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let stopping = services.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        stopping.stop();
    });

    let server = HttpServer::new(services.app_state(), Duration::from_secs(config.timeouts.request_secs));
    server.run(listener, &services.shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
