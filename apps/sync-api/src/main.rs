//! crmsync sync service.
//!
//! Serves the HaloPSA directory sync endpoints over HTTP, backed by either the
//! hosted record store (`CRM_STORE_URL`) or an in-memory store.

mod config;
mod health;
mod logging;
mod openapi;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use crmsync_api_directory::{directory_sync_router, DirectorySyncService, DirectorySyncState};
use crmsync_reconcile::{InMemoryStore, RecordStore, RestRecordStore, StoreResult};
use tokio::signal;
use tracing::{info, warn};

use config::{AppConfig, StoreConfig};
use health::{health_routes, HealthState};
use logging::init_logging;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.log_filter) {
        eprintln!("Invalid log filter {:?}: {e}", config.log_filter);
        std::process::exit(1);
    }

    let addr = config.bind_addr().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });

    let store = build_store(config.store).unwrap_or_else(|e| {
        eprintln!("Record store error: {e}");
        std::process::exit(1);
    });

    info!(
        %addr,
        store = store.store_type(),
        update_group_size = config.write_options.update_group_size,
        create_batch_size = config.write_options.create_batch_size,
        "Starting sync-api"
    );

    let service = DirectorySyncService::new(Arc::clone(&store), config.halo)
        .with_write_options(config.write_options);
    let app = build_app(service, store.store_type());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        });

    info!(%addr, "sync-api listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

fn build_store(config: Option<StoreConfig>) -> StoreResult<Arc<dyn RecordStore>> {
    match config {
        Some(store) => {
            let rest = RestRecordStore::new(store.base_url, store.api_key, store.timeout)?;
            Ok(Arc::new(rest))
        }
        None => {
            warn!("CRM_STORE_URL not set, using in-memory record store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

fn build_app(service: DirectorySyncService, store_type: &'static str) -> Router {
    let health = HealthState {
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION"),
        store_type,
    };

    Router::new()
        .merge(health_routes(Arc::new(health)))
        .merge(openapi::docs_routes())
        .merge(directory_sync_router(DirectorySyncState::new(service)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
