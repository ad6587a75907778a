//! Router assembly: HTTP endpoints, upload body limits, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - participant API under `/api` (register, leaderboard, users)
/// - question bank API under `/api/questions`
/// - `/health`
/// - per-route body limits for the two CSV upload endpoints
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let limits = state.config.limits.clone();

    Router::new()
        .route("/health", get(http::http_health))
        // Participants
        .route("/api/register", post(http::http_register))
        .route("/api/leaderboard", get(http::http_leaderboard))
        .route("/api/leaderboard/update", post(http::http_update_scores))
        .route("/api/users/count", get(http::http_count_users))
        .route("/api/users", get(http::http_list_users))
        .route(
            "/api/users/upload",
            post(http::http_upload_users).layer(DefaultBodyLimit::max(limits.participant_upload_bytes)),
        )
        // Questions
        .route(
            "/api/questions/upload",
            post(http::http_upload_questions).layer(DefaultBodyLimit::max(limits.question_upload_bytes)),
        )
        .route("/api/questions", get(http::http_list_questions))
        .route("/api/questions/:round/:level", get(http::http_list_questions_by_level))
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
}
