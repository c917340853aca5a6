//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LocalObjectStore},
    config::Config,
    error::ApiError,
    sweep_task::spawn_orphan_sweeper,
    web::{router, state::AppState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Object Store ---
    tokio::fs::create_dir_all(&config.storage_root).await?;
    let object_store = Arc::new(LocalObjectStore::new(
        config.storage_root.clone(),
        config.public_base_url.clone(),
    ));
    info!("Storing uploads under {}", config.storage_root.display());

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        db_adapter.clone(),
        db_adapter.clone(),
        db_adapter.clone(),
        object_store.clone(),
    ));

    // --- 5. Start the Orphan Sweeper ---
    let shutdown = CancellationToken::new();
    let sweeper = spawn_orphan_sweeper(
        object_store,
        db_adapter,
        config.orphan_ttl,
        config.orphan_sweep_interval,
        shutdown.clone(),
    );

    // --- 6. Create the Web Router ---
    let app = router(app_state)?;

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received.");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = sweeper.await;
    Ok(())
}
