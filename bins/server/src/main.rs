//! Fieldops API Server
//!
//! Main entry point for the Fieldops backend service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldops_api::{AppState, create_router};
use fieldops_core::storage::{FileStorage, StorageConfig};
use fieldops_db::connect;
use fieldops_shared::{AppConfig, StorageSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldops=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    let storage_settings =
        StorageSettings::load().context("Failed to load file storage settings")?;

    // Storage is shared by every request; driver and client resolve once
    let storage = FileStorage::new(StorageConfig::from_settings(&storage_settings));
    info!(
        driver = %storage.active_driver(),
        serve_mode = ?storage.config().serve_mode,
        base_path = %storage.config().base_path.display(),
        "File storage configured"
    );

    // Connect to database
    let db = connect(&config.database.url).await?;
    info!("Connected to database");

    // Create application state
    let state = AppState {
        db: Arc::new(db),
        storage: Arc::new(storage),
        max_upload_bytes: config.server.max_upload_bytes,
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
