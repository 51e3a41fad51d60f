//! Application startup and lifecycle management.

use crate::config::DeployerConfig;
use crate::handlers::receive_push;
use crate::services::{CloudRunDirectory, DeploymentDirectory, DigestPinner};
use crate::AppState;
use axum::{middleware::from_fn, Router};
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Every request, whatever its path or method, is a push delivery.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(receive_push)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build against the Cloud Run Admin API for the configured region.
    pub async fn build(config: DeployerConfig) -> Result<Self, AppError> {
        let directory = CloudRunDirectory::new(&config).map_err(|e| {
            tracing::error!("Failed to initialize Cloud Run client: {}", e);
            AppError::InternalError(anyhow::anyhow!("failed to initialize client: {}", e))
        })?;

        tracing::info!(endpoint = %directory.endpoint(), "Cloud Run client initialized");

        Self::build_with_directory(config, Arc::new(directory)).await
    }

    /// Build with any directory implementation (port 0 picks a free port).
    pub async fn build_with_directory(
        config: DeployerConfig,
        directory: Arc<dyn DeploymentDirectory>,
    ) -> Result<Self, AppError> {
        let target = config.service_name();
        let pinner = Arc::new(DigestPinner::new(directory, target));
        let state = AppState::new(pinner, config.max_body_bytes);

        let address = config.common.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            service = %state.pinner.target(),
            "Digest deployer listening on port {}",
            port
        );

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
