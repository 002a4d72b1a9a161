//! Axum router wiring (WebSocket upgrade + the thin `/api` HTTP surface).

use axum::routing::{get, post, put};
use axum::Router;

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(transport::ws::ws_upgrade))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .route("/api/health", get(ops::health))
        .route("/api/languages", get(ops::list_languages))
        .route("/api/languages/active", get(ops::list_active_languages))
        .route("/api/languages/:code/status", put(ops::set_language_status))
        .route("/api/transcripts/:session_id", get(ops::transcripts_for_session))
        .route(
            "/api/transcripts/:session_id/:language",
            get(ops::transcripts_for_session_language),
        )
        .route("/api/transcripts", post(ops::create_transcript))
        .route("/api/translations/:language", get(ops::translations_for_language))
        .route("/api/translations", post(ops::create_translation))
        .with_state(state)
}
