//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/catalogs", get(http::http_get_catalogs))
        .route("/api/v1/problem", get(http::http_get_problem))
        .route("/api/v1/problem/:id", get(http::http_get_problem_by_id))
        .route("/api/v1/hint", get(http::http_get_hint))
        .route("/api/v1/feedback", post(http::http_post_feedback))
        .route("/api/v1/notes", post(http::http_post_save_note))
        .route("/api/v1/notes/problems", get(http::http_get_note_problems))
        .route("/api/v1/notes/attempts", get(http::http_get_note_attempts))
        .route("/api/v1/notes/rechallenge", post(http::http_post_rechallenge))
        .route("/api/v1/favorites", get(http::http_get_favorites))
        .route("/api/v1/favorites/toggle", post(http::http_post_toggle_favorite))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
