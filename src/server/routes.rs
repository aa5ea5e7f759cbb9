//! Router configuration for the trigger API.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/orchestrators/process_blob",
            post(handlers::start_orchestration),
        )
        .route("/api/instances/:instance_id", get(handlers::instance_status))
        .route("/api/events/blob", post(handlers::blob_events))
        .route("/api/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
