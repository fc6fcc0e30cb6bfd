use crate::config::ServerConfig;
use crate::liveness::LivenessSupervisor;
use crate::signaling::{SignalingService, ws_handler};
use crate::status::{health_handler, rooms_handler, status_handler};
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub fn router(service: SignalingService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/status", get(status_handler))
        .route("/rooms", get(rooms_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(service)
}

/// Binds `config.bind_addr` and runs the relay until `shutdown` resolves.
pub async fn serve<F>(config: ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    serve_with_listener(listener, config, shutdown).await
}

pub async fn serve_with_listener<F>(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    serve_service(listener, SignalingService::new(config), shutdown).await
}

/// Runs an already built service, e.g. one the caller keeps a handle to.
pub async fn serve_service<F>(
    listener: TcpListener,
    service: SignalingService,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let heartbeat_interval = service.config().heartbeat_interval;

    let (stop_tx, stop_rx) = watch::channel(false);
    let supervisor =
        LivenessSupervisor::new(service.rooms().clone(), heartbeat_interval).spawn(stop_rx);

    info!(
        "Signaling server listening on http://{}",
        listener.local_addr().context("Listener has no local address")?
    );

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Relay server failed")?;

    let _ = stop_tx.send(true);
    let _ = supervisor.await;
    Ok(())
}
