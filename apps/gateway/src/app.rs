//! Gateway runtime: binds the upload server over a chunk store and
//! keeps the stale-chunk sweeper running until shutdown.

use std::sync::Arc;
use std::time::Duration;

use gantry_server::{ServerConfig, UploadServer, UploadService};
use gantry_store::ChunkStore;

use crate::config::Config;

/// Runs the gateway until shutdown is requested.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // -- Chunk store --
    let store = Arc::new(ChunkStore::new(&config.temp_root)?);
    tracing::info!(temp_root = %store.temp_root().display(), "chunk store ready");

    // -- WS server --
    let service = UploadService::new(Arc::clone(&store));
    let server_config = ServerConfig { port: config.port };

    let server = UploadServer::new(server_config, service);
    let server_run = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = server_run.run().await {
            tracing::error!("server error: {e}");
        }
    });

    // Wait for the server to bind.
    let port = loop {
        let p = server.port().await;
        if p > 0 {
            break p;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };

    tracing::info!(port, "upload gateway listening");

    // -- Stale sweeper --
    let sweeper = if config.sweep_interval_secs > 0 {
        let store = Arc::clone(&store);
        let interval = Duration::from_secs(config.sweep_interval_secs);
        let ttl = Duration::from_secs(config.stale_ttl_secs);
        Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                // The store only does blocking I/O.
                let store = Arc::clone(&store);
                let swept = tokio::task::spawn_blocking(move || store.sweep_stale(ttl)).await;
                match swept {
                    Ok(Ok(0)) => {}
                    Ok(Ok(removed)) => {
                        tracing::info!(removed, "stale chunk directories removed");
                    }
                    Ok(Err(e)) => tracing::warn!("stale sweep failed: {e}"),
                    Err(e) => tracing::error!("stale sweep task failed: {e}"),
                }
            }
        }))
    } else {
        tracing::info!("stale sweeper disabled");
        None
    };

    tracing::info!("gateway ready");

    // -- Main loop: wait for shutdown --
    tokio::signal::ctrl_c().await?;
    tracing::info!("SIGINT received, shutting down");

    // -- Graceful shutdown --
    if let Some(handle) = sweeper {
        handle.abort();
    }
    server.shutdown();

    Ok(())
}
