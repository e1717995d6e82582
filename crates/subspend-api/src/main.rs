//! Subspend API - Main Entry Point

use clap::Parser;
use std::sync::Arc;
use subspend_api::config::{Args, ServerConfig, StorageBackend};
use subspend_api::{build_router, telemetry, ApiState};
use subspend_core::{InMemorySubscriptionStore, PgSubscriptionStore, SubscriptionStore};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    let config = ServerConfig::load(&args)?;

    telemetry::init_logging(&config)?;
    tracing::info!("Subspend API v{}", env!("CARGO_PKG_VERSION"));

    match &args.config {
        Some(path) if path.exists() => tracing::info!(path = %path.display(), "Loaded config"),
        _ => tracing::warn!("Config not found, using defaults"),
    }

    let store: Arc<dyn SubscriptionStore> = match config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            Arc::new(InMemorySubscriptionStore::new())
        }
        StorageBackend::Postgres => {
            let db = &config.database;
            tracing::info!(url = %db.display_url(), "Using PostgreSQL storage");

            let store = PgSubscriptionStore::connect(db.connect_options(), db.store_options()).await?;
            if db.run_migrations {
                store.run_migrations().await?;
            }
            Arc::new(store)
        }
    };

    let app = build_router(ApiState::new(store));

    let address = config.listen_address();
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(%address, "API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
