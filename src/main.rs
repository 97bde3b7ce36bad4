mod api;
mod config;
mod db;
mod error;
mod geocode;
mod model;
mod schedule;
mod state;
mod store;
mod sync;
mod workspace;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::geocode::NominatimGeocoder;
use crate::state::AppState;
use crate::store::{DocumentStore, InMemoryDocumentStore, SqlDocumentStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(&config.log_level);
    config.log_startup_warnings();

    let store: Arc<dyn DocumentStore> = if db::is_memory_url(&config.db_url) {
        Arc::new(InMemoryDocumentStore::new())
    } else {
        let pool = db::connect_and_migrate(&config.db_url)
            .await
            .context("failed to initialize database")?;
        Arc::new(SqlDocumentStore::new(pool))
    };

    let geocoder = NominatimGeocoder::new(
        &config.geocoder.url,
        &config.geocoder.user_agent,
        config.geocoder.timeout(),
    )?;

    let state = AppState::new(config.clone(), store, Arc::new(geocoder));
    if let Err(error) = state.sync.ensure_loaded().await {
        // Requests retry the load lazily.
        tracing::warn!(error = %error, "initial load failed, serving with an empty workspace");
    }

    let app = api::app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "sitebook server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?error, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
