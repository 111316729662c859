//! HTTP surface: a single-page form and one JSON endpoint.

pub mod error;
pub mod handlers;
pub mod render;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::JobAssistant;

pub use error::ApiError;
pub use render::render_markdown;

/// Upper bound on a multipart request, resume included.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<JobAssistant>,
    /// Cancelled on shutdown; every in-flight run listens on a child.
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index_handler))
        .route("/health", get(handlers::health_handler))
        .route(
            "/api/generate",
            post(handlers::generate_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}

/// Serves until `state.shutdown` is cancelled, then drains open connections.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Listening on http://{}", addr);
    }
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
