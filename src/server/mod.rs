//! HTTP API
//!
//! [`build_router`] is shared by the `serve` command and the integration
//! tests so both exercise the same middleware stack.

pub mod error;
pub mod handlers;
pub mod response;

pub use error::{ApiError, ApiResult};
pub use response::{ApiResponse, ResponseMetadata};

use crate::app::App;
use crate::batch::MAX_BATCH_IMAGES;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub const API_VERSION: &str = "2.0.0";

/// Multipart framing allowance on top of the raw image bytes.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared handler state; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<App>,
}

pub fn build_router(app: Arc<App>) -> Router {
    let body_limit = app.limits().max_image_bytes * MAX_BATCH_IMAGES + MULTIPART_OVERHEAD;
    let state = AppState { app };

    let api = Router::new()
        .route("/colorize", post(handlers::colorize))
        .route("/colorize/batch", post(handlers::colorize_batch))
        .route("/jobs/{job_id}", get(handlers::job_status))
        .route("/analytics/usage", get(handlers::usage));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/health", get(handlers::health))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(app: Arc<App>, addr: SocketAddr) -> crate::Result<()> {
    let router = build_router(app);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

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
