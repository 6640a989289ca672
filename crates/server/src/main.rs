//! crypto-market-overwatch
//!
//! Polls a crypto listings endpoint and exposes the figures as Prometheus
//! gauges and a JSON API.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use overwatch_collector::{AssetStore, Collector, InstrumentRegistry, QueryService};
use overwatch_server::{logging, settings, Cli, HttpServer, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = settings::load(&cli)?;
    let _log_guard = logging::init(&config.logging)?;

    info!("Starting crypto-market-overwatch v{}", VERSION);
    info!(
        "Polling {} every {}s for {:?}",
        config.collector.endpoint, config.collector.interval_secs, config.collector.currencies
    );

    let store = Arc::new(AssetStore::new());
    let registry = Arc::new(InstrumentRegistry::new(config.collector.namespace.as_str())?);

    let mut collector = Collector::from_config(&config.collector, Arc::clone(&store), Arc::clone(&registry))?;
    collector.start()?;
    info!("Collector started");

    let server = HttpServer::new(config.server.clone(), QueryService::new(store, registry));
    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Cannot listen on {}: {:#}", server.address(), e);
            collector.stop().await;
            return Err(e);
        }
    };

    // Setup shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C");
            }
            _ = terminate => {
                info!("Received termination signal");
            }
        }

        let _ = shutdown_tx.send(());
    });

    info!("Press Ctrl+C to shutdown");

    let result = server.serve(listener, shutdown_rx).await;
    collector.stop().await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        return Err(e);
    }

    info!("Server shutdown complete");
    Ok(())
}
