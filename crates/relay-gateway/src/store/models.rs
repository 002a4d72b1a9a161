//! Durable row types, one `FromRow` struct per table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Post-hoc classification of an ended (or mid-lifecycle) session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "snake_case")]
pub enum SessionQuality {
    Unknown,
    Real,
    NoStudents,
    NoActivity,
    TooShort,
}

/// Row for the `users` entity (§3): an account, not a connection. Per-connection
/// role/language/session-membership lives only in the in-memory connection
/// registry, never here.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageRow {
    pub code: String,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub id: Uuid,
    pub teacher_id: Option<String>,
    pub class_code: Option<String>,
    pub teacher_language: Option<String>,
    pub student_language: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
    pub students_count: i32,
    pub total_translations: i32,
    pub is_active: bool,
    pub quality: SessionQuality,
    pub quality_reason: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub language_code: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub source_language: String,
    pub target_language: String,
    pub source_text: String,
    pub translated_text: String,
    pub created_at: DateTime<Utc>,
}
