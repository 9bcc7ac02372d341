use anyhow::{Context, Result};
use axum::Router;
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod providers;
mod routes;
mod services;
#[cfg(test)]
mod testing;

use providers::session::{Session, Sessions, http_client};
use services::migration_service::MigrationService;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting drive-blob-bridge with config: {:?}", cfg);

    // --- Provider sessions ---
    let http = http_client(cfg.transfer_timeout).context("building HTTP client")?;
    let sessions = Sessions::from_config(&cfg, http);
    match &sessions.source {
        Session::Ready(drive) => tracing::info!("Source: Drive folder {}", drive.folder_id()),
        Session::Unconfigured(reason) => tracing::warn!("Source provider unconfigured: {}", reason),
    }
    match &sessions.destination {
        Session::Ready(blob) => tracing::info!("Destination: container {}", blob.container()),
        Session::Unconfigured(reason) => {
            tracing::warn!("Destination provider unconfigured: {}", reason)
        }
    }

    // --- Initialize core service ---
    let shutdown = CancellationToken::new();
    let service = MigrationService::new(sessions, cfg.transfer_timeout, shutdown.clone());

    // --- Build router ---
    let app: Router = routes::routes::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err).with_context(|| format!("binding {}", addr)),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Wait for Ctrl-C, then cancel in-flight transfers so the server can drain.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        return;
    }
    tracing::info!("Shutdown requested, cancelling in-flight transfers");
    shutdown.cancel();
}
