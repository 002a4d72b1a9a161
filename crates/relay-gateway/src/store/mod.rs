//! Durable store (users, languages, sessions, transcripts, translations).
//!
//! One `Store` wraps a `PgPool`; each entity gets its own small set of
//! `query`/`query_as` calls, mirroring the donor's session-service shape
//! (`create_session`, `complete_session`, ...) but against Postgres rather
//! than SQLite.

pub mod models;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use relay_core::error::{RelayError, Result};

pub use models::{LanguageRow, SessionQuality, SessionRow, TranscriptRow, TranslationRow, UserRow};

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| RelayError::Store(format!("connect failed: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("migration failed: {e}")))
    }

    /// Cheap liveness probe for `/api/health`: a bare `SELECT 1`, no table access.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    // ---- sessions ----------------------------------------------------

    const SESSION_COLUMNS: &'static str = "id, teacher_id, class_code, teacher_language, student_language, \
        start_time, end_time, last_activity_at, students_count, total_translations, is_active, quality, quality_reason";

    pub async fn create_session(
        &self,
        teacher_id: Option<&str>,
        teacher_language: Option<&str>,
    ) -> Result<SessionRow> {
        let sql = format!(
            r#"
            INSERT INTO sessions (id, teacher_id, teacher_language, start_time, last_activity_at, is_active)
            VALUES ($1, $2, $3, now(), now(), true)
            RETURNING {}
            "#,
            Self::SESSION_COLUMNS
        );
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(teacher_id)
            .bind(teacher_language)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("create_session: {e}")))
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Option<SessionRow>> {
        let sql = format!("SELECT {} FROM sessions WHERE id = $1", Self::SESSION_COLUMNS);
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("get_session: {e}")))
    }

    pub async fn find_session_by_teacher(&self, teacher_id: &str) -> Result<Option<SessionRow>> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE teacher_id = $1 ORDER BY start_time DESC LIMIT 1",
            Self::SESSION_COLUMNS
        );
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(teacher_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("find_session_by_teacher: {e}")))
    }

    pub async fn set_class_code(&self, session_id: Uuid, class_code: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET class_code = $2 WHERE id = $1")
            .bind(session_id)
            .bind(class_code)
            .execute(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("set_class_code: {e}")))?;
        Ok(())
    }

    pub async fn set_student_language(&self, session_id: Uuid, language: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET student_language = $2 WHERE id = $1")
            .bind(session_id)
            .bind(language)
            .execute(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("set_student_language: {e}")))?;
        Ok(())
    }

    pub async fn touch_activity(&self, session_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE sessions SET last_activity_at = now() WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("touch_activity: {e}")))?;
        Ok(())
    }

    pub async fn increment_students_count(&self, session_id: Uuid, delta: i32) -> Result<()> {
        sqlx::query("UPDATE sessions SET students_count = GREATEST(0, students_count + $2) WHERE id = $1")
            .bind(session_id)
            .bind(delta)
            .execute(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("increment_students_count: {e}")))?;
        Ok(())
    }

    pub async fn increment_total_translations(&self, session_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE sessions SET total_translations = total_translations + 1 WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("increment_total_translations: {e}")))?;
        Ok(())
    }

    pub async fn reactivate_session(&self, session_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET is_active = true, end_time = NULL, last_activity_at = now() WHERE id = $1",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RelayError::Store(format!("reactivate_session: {e}")))?;
        Ok(())
    }

    pub async fn end_session(
        &self,
        session_id: Uuid,
        quality: SessionQuality,
        reason: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET is_active = false, end_time = now(), quality = $2, quality_reason = $3 WHERE id = $1",
        )
        .bind(session_id)
        .bind(quality)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| RelayError::Store(format!("end_session: {e}")))?;
        Ok(())
    }

    pub async fn active_sessions_for_sweep(&self) -> Result<Vec<SessionRow>> {
        let sql = format!("SELECT {} FROM sessions WHERE is_active = true", Self::SESSION_COLUMNS);
        sqlx::query_as::<_, SessionRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("active_sessions_for_sweep: {e}")))
    }

    /// Active sessions already carrying the given `teacherLanguage`, newest
    /// first — candidates for reconnection by language (§4.5.1 step 2).
    pub async fn active_sessions_by_teacher_language(&self, teacher_language: &str) -> Result<Vec<SessionRow>> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE is_active = true AND teacher_language = $1 ORDER BY start_time DESC",
            Self::SESSION_COLUMNS
        );
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(teacher_language)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("active_sessions_by_teacher_language: {e}")))
    }

    /// First-ever-student re-anchor (§4.5.1): `startTime` is reset to the
    /// moment the first student actually joins, rather than when the teacher
    /// opened the (possibly long-idle) session.
    pub async fn reanchor_start_time(&self, session_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE sessions SET start_time = now() WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("reanchor_start_time: {e}")))?;
        Ok(())
    }

    // ---- users -----------------------------------------------------------
    // Accounts (§3's `User` entity): created once at registration, immutable
    // thereafter. The authentication route that would call these lives
    // outside this gateway's scope; these are the storage primitives it
    // would use.

    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<UserRow> {
        sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id, username, password_hash",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RelayError::Store(format!("create_user: {e}")))
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>("SELECT id, username, password_hash FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("find_user_by_username: {e}")))
    }

    // ---- languages -------------------------------------------------------

    pub async fn list_languages(&self) -> Result<Vec<LanguageRow>> {
        sqlx::query_as::<_, LanguageRow>("SELECT code, name, is_active FROM languages ORDER BY code")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RelayError::Store(format!("list_languages: {e}")))
    }

    pub async fn list_active_languages(&self) -> Result<Vec<LanguageRow>> {
        sqlx::query_as::<_, LanguageRow>(
            "SELECT code, name, is_active FROM languages WHERE is_active = true ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayError::Store(format!("list_active_languages: {e}")))
    }

    pub async fn set_language_active(&self, code: &str, is_active: bool) -> Result<LanguageRow> {
        sqlx::query_as::<_, LanguageRow>(
            "UPDATE languages SET is_active = $2 WHERE code = $1 RETURNING code, name, is_active",
        )
        .bind(code)
        .bind(is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RelayError::Store(format!("set_language_active: {e}")))
    }

    // ---- transcripts -------------------------------------------------------

    pub async fn insert_transcript(
        &self,
        session_id: Uuid,
        language_code: &str,
        text: &str,
    ) -> Result<TranscriptRow> {
        sqlx::query_as::<_, TranscriptRow>(
            r#"
            INSERT INTO transcripts (id, session_id, language_code, text, created_at)
            VALUES ($1, $2, $3, $4, now())
            RETURNING id, session_id, language_code, text, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(language_code)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RelayError::Store(format!("insert_transcript: {e}")))
    }

    pub async fn transcripts_for_session(&self, session_id: Uuid) -> Result<Vec<TranscriptRow>> {
        sqlx::query_as::<_, TranscriptRow>(
            "SELECT id, session_id, language_code, text, created_at FROM transcripts WHERE session_id = $1 ORDER BY created_at",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayError::Store(format!("transcripts_for_session: {e}")))
    }

    pub async fn transcripts_for_session_language(
        &self,
        session_id: Uuid,
        language_code: &str,
    ) -> Result<Vec<TranscriptRow>> {
        sqlx::query_as::<_, TranscriptRow>(
            r#"
            SELECT id, session_id, language_code, text, created_at FROM transcripts
            WHERE session_id = $1 AND language_code = $2
            ORDER BY created_at
            "#,
        )
        .bind(session_id)
        .bind(language_code)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayError::Store(format!("transcripts_for_session_language: {e}")))
    }

    // ---- translations -------------------------------------------------------

    pub async fn insert_translation(
        &self,
        session_id: Uuid,
        source_language: &str,
        target_language: &str,
        source_text: &str,
        translated_text: &str,
    ) -> Result<TranslationRow> {
        sqlx::query_as::<_, TranslationRow>(
            r#"
            INSERT INTO translations
                (id, session_id, source_language, target_language, source_text, translated_text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            RETURNING id, session_id, source_language, target_language, source_text, translated_text, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(source_language)
        .bind(target_language)
        .bind(source_text)
        .bind(translated_text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RelayError::Store(format!("insert_translation: {e}")))
    }

    /// Most recent translations into `target_language` across all sessions,
    /// newest first, capped at `limit`.
    pub async fn translations_for_language(&self, target_language: &str, limit: i64) -> Result<Vec<TranslationRow>> {
        sqlx::query_as::<_, TranslationRow>(
            r#"
            SELECT id, session_id, source_language, target_language, source_text, translated_text, created_at
            FROM translations WHERE target_language = $1 ORDER BY created_at DESC LIMIT $2
            "#,
        )
        .bind(target_language)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayError::Store(format!("translations_for_language: {e}")))
    }
}
