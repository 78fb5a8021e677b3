use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};

use appoint_server::config::Config;
use appoint_server::{app_router, AppState, Stores};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!(
        "Starting reviewer appointment service ({})",
        appoint_server::get_service_version()
    );

    let config = Config::from_env().context("Failed to load configuration from environment")?;
    let stores = Stores::open(&config)?;
    let app_state = Arc::new(AppState::new(stores, config.rng_seed));

    let app = app_router(app_state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
