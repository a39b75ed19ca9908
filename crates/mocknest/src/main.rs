//! mocknest - data-driven HTTP and WebSocket mock servers.
//!
//! Reads service and WebSocket server definitions from a JSON document store
//! and starts a listener per definition. Rule content is re-read from the
//! store on every request, so edits to the JSON files take effect live.

use anyhow::{Context, Result};
use clap::Parser;
use mocknest::server::HttpMockManager;
use mocknest::store::{FileStore, ServiceStore};
use mocknest::ws::WsMockManager;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mocknest")]
#[command(about = "Data-driven HTTP and WebSocket mock servers")]
#[command(version)]
struct Cli {
    /// Directory holding services.json and ws_servers.json
    #[arg(long, env = "MOCKNEST_STORE_DIR", default_value = "./mocknest-data")]
    store_dir: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let store: Arc<dyn ServiceStore> = Arc::new(
        FileStore::new(&cli.store_dir)
            .with_context(|| format!("Failed to open store directory '{}'", cli.store_dir))?,
    );
    info!("Using store directory '{}'", cli.store_dir);

    let http = HttpMockManager::new(Arc::clone(&store));
    let ws = WsMockManager::new(Arc::clone(&store));

    let services = store.get_services().context("Failed to load services")?;
    if services.is_empty() {
        info!("No HTTP services defined yet; edit services.json to add some");
    }
    for service in &services {
        match http.start(&service.id, service.port, &service.prefix).await {
            Ok(port) => info!(
                "HTTP service '{}' ({}) listening on port {}",
                service.id, service.name, port
            ),
            Err(e) => error!("Failed to start HTTP service '{}': {}", service.id, e),
        }
    }

    // First read of an empty store seeds the example echo server.
    let ws_configs = store
        .get_ws_servers()
        .context("Failed to load WebSocket servers")?;
    for config in &ws_configs {
        match ws.start(&config.id).await {
            Ok(()) => info!(
                "WebSocket server '{}' ({}) listening on port {}{}",
                config.id, config.name, config.port, config.path
            ),
            Err(e) => error!("Failed to start WebSocket server '{}': {}", config.id, e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to wait for ctrl-c: {}", e);
    }
    info!("Shutting down");
    http.shutdown();
    ws.shutdown();
    Ok(())
}
