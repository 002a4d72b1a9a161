//! Thin HTTP surface alongside the WebSocket gateway.
//!
//! `/api/health` reports liveness, a `SELECT 1` database probe, process
//! uptime, and the cached active-session/teacher/student counts (C10); the
//! remaining `/api/*` routes are read/admin endpoints over the durable store
//! (languages, transcripts, translations). `/metrics` renders the Prometheus
//! text exposition the donor's ops module also served, just against this
//! crate's counters.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::app_state::AppState;

const DEFAULT_TRANSLATIONS_LIMIT: i64 = 50;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ready")
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthBody {
    status: &'static str,
    version: &'static str,
    database: &'static str,
    active_sessions: usize,
    active_teachers: usize,
    active_students: usize,
    uptime: u64,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = if state.store().ping().await { "ok" } else { "unreachable" };
    let body = HealthBody {
        status: if state.is_draining() { "draining" } else { "ok" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        active_sessions: state.active_count().active_sessions(),
        active_teachers: state.registry().active_role_count(crate::registry::Role::Teacher),
        active_students: state.active_count().active_students(),
        uptime: state.uptime().as_secs(),
    };
    Json(body)
}

pub async fn list_languages(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let languages = state.store().list_languages().await?;
    Ok(Json(languages))
}

pub async fn list_active_languages(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let languages = state.store().list_active_languages().await?;
    Ok(Json(languages))
}

#[derive(Deserialize)]
pub struct LanguageStatusBody {
    pub is_active: bool,
}

pub async fn set_language_status(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<LanguageStatusBody>,
) -> Result<impl IntoResponse, ApiError> {
    let language = state.store().set_language_active(&code, body.is_active).await?;
    Ok(Json(language))
}

pub async fn transcripts_for_session(
    State(state): State<AppState>,
    Path(session_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.store().transcripts_for_session(session_id).await?;
    Ok(Json(rows))
}

pub async fn transcripts_for_session_language(
    State(state): State<AppState>,
    Path((session_id, language)): Path<(uuid::Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state
        .store()
        .transcripts_for_session_language(session_id, &language)
        .await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct TranslationsQuery {
    pub limit: Option<i64>,
}

pub async fn translations_for_language(
    State(state): State<AppState>,
    Path(language): Path<String>,
    Query(query): Query<TranslationsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_TRANSLATIONS_LIMIT).clamp(1, 500);
    let rows = state.store().translations_for_language(&language, limit).await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTranscriptBody {
    pub session_id: Uuid,
    pub language_code: String,
    pub text: String,
}

pub async fn create_transcript(
    State(state): State<AppState>,
    Json(body): Json<CreateTranscriptBody>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .store()
        .insert_transcript(body.session_id, &body.language_code, &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTranslationBody {
    pub session_id: Uuid,
    pub source_language: String,
    pub target_language: String,
    pub source_text: String,
    pub translated_text: String,
}

pub async fn create_translation(
    State(state): State<AppState>,
    Json(body): Json<CreateTranslationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .store()
        .insert_translation(
            body.session_id,
            &body.source_language,
            &body.target_language,
            &body.source_text,
            &body.translated_text,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics().render(&[]);
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}
