use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.service.static_dir.clone();
    // Leave headroom above the upload cap for multipart framing
    let body_limit = state.config.limits.max_bytes + 1024 * 1024;

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Batch transcription upload
        .route("/transcribe", post(handlers::transcribe))
        // Realtime streaming relay
        .route("/ws/realtime", get(handlers::ws_realtime))
        // Frontend assets; API routes above take precedence
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
