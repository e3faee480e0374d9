use anyhow::{Context, Result};
use std::net::SocketAddr;

mod handlers;
mod routes;
mod state;
mod templates;

use common::config::Settings;
use common::db::{ClientOptions, SharedRedis};
use common::telemetry;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Settings::load().context("Failed to load settings")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(&config.observability.log_level, config.observability.log_format)?;
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        secrets = %config.secrets.path.display(),
        "Configuration loaded"
    );

    let metrics_handle = telemetry::init_metrics()?;

    // The Redis connection itself is created on the first page visit
    let redis = SharedRedis::new(config.secrets.path.clone(), ClientOptions::default());
    let state = AppState::new(redis, Some(metrics_handle));

    let app = routes::create_router(state);

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .context("Invalid server host")?,
        config.server.port,
    ));
    tracing::info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Graceful shutdown signal handler
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Initiating graceful shutdown");
}
