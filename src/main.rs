//! ==============================================================================
//! main.rs - sensor hub entry point
//! ==============================================================================
//!
//! purpose:
//!     accepts sensor readings (type, value, location, description) from a
//!     web form or any http client, stores them in azure table storage when
//!     credentials are configured, and serves them back filtered by type.
//!
//! responsibilities:
//!     - load configuration (server.toml, .env, environment)
//!     - set up tracing
//!     - choose the storage backend once, for the whole process
//!     - make sure the azure table exists (failures are logged, not fatal)
//!     - serve the api and the static form until ctrl+c
//!
//! relationships:
//!     - uses: config.rs (HubConfig)
//!     - uses: storage/ (open_store, ReadingStore)
//!     - uses: api.rs (router + handlers)
//!
//! architecture:
//!
//!     ┌────────────────────────────────────────────────────────────┐
//!     │                      rust hub (this file)                  │
//!     │   browser form ──► POST /api/sensor-data ──► validation    │
//!     │                                               │            │
//!     │                                        ┌──────┴──────┐     │
//!     │                                        │ ReadingStore│     │
//!     │                                        └──────┬──────┘     │
//!     │                  ┌────────────────────────────┴─────┐      │
//!     │                  ▼                                  ▼      │
//!     │      ┌─────────────────────┐              ┌────────────┐   │
//!     │      │ azure table storage │ ── on error ►│  in-memory │   │
//!     │      └─────────────────────┘              └────────────┘   │
//!     └────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

mod api;
mod config;
mod domain;
mod error;
mod storage;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is normal outside development
    dotenvy::dotenv().ok();

    // startup banner
    println!("===========================================================");
    println!("  Sensor Hub");
    println!("  \"Submit readings, keep them, list them\"");
    println!("===========================================================");

    // step 1: load configuration
    let config = config::HubConfig::load_or_default();
    config.print_summary();

    // step 2: logging (RUST_LOG wins over the config file)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // step 3: storage backend, fixed for the lifetime of the process
    let store = storage::open_store(&config.storage);
    if let Err(e) = store.ensure_ready().await {
        tracing::warn!("Table setup failed, continuing anyway: {}", e);
    }

    // step 4: web server
    let app = api::app(api::AppState::new(store.clone()), &config.server.frontend_dir);
    let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;

    tracing::info!("Server is running on http://{}", listener.local_addr()?);
    tracing::info!("Storage: {}", store.backend());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl+c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
