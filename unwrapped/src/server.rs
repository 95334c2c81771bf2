//! unwrapped-server - HTTP front end for channel reports

use std::sync::Arc;

use anyhow::{Context, Result};
use unwrapped::api::{router, AppState};
use unwrapped_core::{AnalyticsService, Config, FsProfileStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = unwrapped_core::logging::init(&config.logging).ok();

    config.validate().context("invalid configuration")?;

    let service = AnalyticsService::from_config(&config).context("failed to start analytics service")?;
    let profiles = config
        .profiles
        .enabled
        .then(|| FsProfileStore::from_config(&config.profiles));

    let app = router(AppState {
        service: Arc::new(service),
        profiles,
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!(bind = %config.server.bind, "Server listening");
    eprintln!("unwrapped-server listening on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
