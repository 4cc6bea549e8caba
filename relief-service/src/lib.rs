//! Relief Service Library
//!
//! HTTP handlers and router for the relief tile service.
//! This library is used by both the relief-service binary and integration tests.

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use relief::{ReliefProtocol, TileTemplate};

/// Application state shared across handlers.
pub struct AppState {
    /// Relief protocol used to fetch and transform tiles.
    pub protocol: ReliefProtocol,
    /// Upstream elevation tile template.
    pub tile_template: TileTemplate,
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tiles/:z/:x/:y", get(handlers::get_tile))
        .route("/transform", post(handlers::post_transform))
        .route("/config", get(handlers::get_config))
        .route("/health", get(handlers::health_check))
        .with_state(state)
}

// Re-export commonly used types for convenience
pub use handlers::{
    ConfigResponse, ErrorResponse, HealthResponse, TileQuery, TransformQuery,
};
