//! Session lifecycle manager (component C9).
//!
//! Owns the sweep that ends stale/abandoned sessions and the pure decision
//! functions (`resolve_teacher_id_session`, `resolve_teacher_language_session`,
//! `classify_quality`, `teacher_disconnect_policy`) that drive reconnection and
//! end-of-life classification. Keeping those as plain functions over owned
//! values (not `&Store`) lets them be unit tested without a database, the same
//! way the donor kept its policy-evaluation logic free of I/O so it could be
//! table-tested.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::{SessionQuality, SessionRow, Store};
use relay_core::error::Result;

const MIN_SESSION_DURATION_SECS: i64 = 30;

/// Fixed window for teacherId-based reactivation (§4.5.1 step 1): unlike the
/// languageCode-only path, this one is not configurable and ignores language.
const TEACHER_ID_REACTIVATION_WINDOW: chrono::Duration = chrono::Duration::minutes(10);

/// What to do with an incoming `register(teacher)` given any existing
/// session row for that teacher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveDecision {
    Reactivate(Uuid),
    CreateNew,
}

/// §4.5.1 step 1: a teacher supplied a stable `teacherId`. Reactivates the
/// most recent session for that id unconditionally if still active, or if it
/// ended within the fixed 10-minute window — regardless of whether the
/// reconnecting `languageCode` matches the session's stored language.
pub fn resolve_teacher_id_session(existing: Option<&SessionRow>, now: DateTime<Utc>) -> ResolveDecision {
    match existing {
        None => ResolveDecision::CreateNew,
        Some(row) if row.is_active => ResolveDecision::Reactivate(row.id),
        Some(row) => {
            let within_window = row
                .end_time
                .map(|ended| now - ended <= TEACHER_ID_REACTIVATION_WINDOW)
                .unwrap_or(false);
            if within_window {
                ResolveDecision::Reactivate(row.id)
            } else {
                ResolveDecision::CreateNew
            }
        }
    }
}

/// Resolution for the languageCode-only path (§4.5.1 step 2), which can turn
/// up more than one active candidate if an anonymous teacher registered more
/// than once without ever supplying a stable id.
pub struct LanguageResolution {
    pub decision: ResolveDecision,
    /// Older active candidates for the same `teacherLanguage`, to be ended
    /// with reason "Teacher created new session".
    pub sessions_to_end: Vec<Uuid>,
}

/// §4.5.1 step 2: no `teacherId`, but a `languageCode` was given. Among the
/// active sessions already carrying that `teacherLanguage`, picks the one
/// still fresh (activity within `grace_period`) and most recently started as
/// the reconnection target; any other fresh candidates are stale duplicates
/// to end. With no fresh candidate, a new session is created.
pub fn resolve_teacher_language_session(
    candidates: &[SessionRow],
    grace_period: StdDuration,
    now: DateTime<Utc>,
) -> LanguageResolution {
    let grace = chrono::Duration::from_std(grace_period).unwrap_or(chrono::Duration::minutes(5));
    let mut fresh: Vec<&SessionRow> =
        candidates.iter().filter(|row| now - row.last_activity_at <= grace).collect();
    fresh.sort_by(|a, b| b.start_time.cmp(&a.start_time));

    match fresh.split_first() {
        None => LanguageResolution { decision: ResolveDecision::CreateNew, sessions_to_end: Vec::new() },
        Some((newest, older)) => LanguageResolution {
            decision: ResolveDecision::Reactivate(newest.id),
            sessions_to_end: older.iter().map(|row| row.id).collect(),
        },
    }
}

/// Classifies a session whose `quality` is still `unknown`.
pub fn classify_quality(
    duration: chrono::Duration,
    students_count: i32,
    total_translations: i32,
    transcript_count: i64,
) -> SessionQuality {
    if duration.num_seconds() < MIN_SESSION_DURATION_SECS {
        SessionQuality::TooShort
    } else if students_count == 0 {
        SessionQuality::NoStudents
    } else if total_translations == 0 && transcript_count == 0 {
        SessionQuality::NoActivity
    } else {
        SessionQuality::Real
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeacherDisconnectDecision {
    EndImmediately,
    AllowGrace,
}

/// Invoked from the connection lifecycle manager (C11) when a teacher socket
/// drops: an empty, very-young, anonymous session ends immediately instead
/// of waiting out the reconnection grace window.
pub fn teacher_disconnect_policy(
    session_age: chrono::Duration,
    students_count: i32,
    had_explicit_teacher_id: bool,
    very_short_threshold: StdDuration,
) -> TeacherDisconnectDecision {
    let threshold = chrono::Duration::from_std(very_short_threshold).unwrap_or(chrono::Duration::seconds(5));
    if students_count == 0 && session_age < threshold && !had_explicit_teacher_id {
        TeacherDisconnectDecision::EndImmediately
    } else {
        TeacherDisconnectDecision::AllowGrace
    }
}

pub struct LifecycleConfig {
    pub empty_teacher_timeout: chrono::Duration,
    pub all_students_left_timeout: chrono::Duration,
    pub stale_session_timeout: chrono::Duration,
}

impl LifecycleConfig {
    pub fn from_std(
        empty_teacher_timeout: StdDuration,
        all_students_left_timeout: StdDuration,
        stale_session_timeout: StdDuration,
    ) -> Self {
        Self {
            empty_teacher_timeout: chrono::Duration::from_std(empty_teacher_timeout)
                .unwrap_or(chrono::Duration::minutes(15)),
            all_students_left_timeout: chrono::Duration::from_std(all_students_left_timeout)
                .unwrap_or(chrono::Duration::minutes(10)),
            stale_session_timeout: chrono::Duration::from_std(stale_session_timeout)
                .unwrap_or(chrono::Duration::hours(1)),
        }
    }
}

pub struct LifecycleManager {
    store: Arc<Store>,
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(store: Arc<Store>, config: LifecycleConfig) -> Arc<Self> {
        Arc::new(Self { store, config })
    }

    /// Runs the three ordered cleanup passes from the state diagram, in
    /// order: empty-teacher, abandoned, long-inactive. Returns how many
    /// sessions each pass ended.
    pub async fn sweep(&self) -> Result<(usize, usize, usize)> {
        let now = Utc::now();
        let sessions = self.store.active_sessions_for_sweep().await?;

        let mut empty_teacher_ended = 0;
        let mut abandoned_ended = 0;
        let mut long_inactive_ended = 0;

        for session in &sessions {
            if session.students_count == 0 && now - session.start_time > self.config.empty_teacher_timeout {
                self.end(session.id, SessionQuality::NoStudents, "no students ever joined").await?;
                empty_teacher_ended += 1;
            }
        }

        for session in &sessions {
            let since_activity = now - session.last_activity_at;
            if session.students_count > 0
                && since_activity > self.config.all_students_left_timeout
                && since_activity <= self.config.stale_session_timeout
            {
                self.end(session.id, SessionQuality::NoActivity, "all students left and none returned").await?;
                abandoned_ended += 1;
            }
        }

        for session in &sessions {
            if now - session.last_activity_at > self.config.stale_session_timeout {
                self.end(session.id, SessionQuality::NoActivity, "session went stale").await?;
                long_inactive_ended += 1;
            }
        }

        Ok((empty_teacher_ended, abandoned_ended, long_inactive_ended))
    }

    async fn end(&self, session_id: Uuid, quality: SessionQuality, reason: &str) -> Result<()> {
        self.store.end_session(session_id, quality, Some(reason)).await
    }

    /// Explicit classification pass for a session whose quality is still
    /// `unknown` (e.g. teacher sent an explicit end-session message).
    pub async fn classify_and_end(&self, session_id: Uuid, reason: Option<&str>) -> Result<()> {
        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(());
        };
        let transcripts = self.store.transcripts_for_session(session_id).await?;
        let duration = Utc::now() - session.start_time;
        let quality = classify_quality(
            duration,
            session.students_count,
            session.total_translations,
            transcripts.len() as i64,
        );
        self.store.end_session(session_id, quality, reason).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_session(is_active: bool) -> SessionRow {
        SessionRow {
            id: Uuid::new_v4(),
            teacher_id: Some("teacher-1".into()),
            class_code: Some("ABC123".into()),
            teacher_language: Some("en-US".into()),
            student_language: None,
            start_time: Utc::now() - chrono::Duration::minutes(10),
            end_time: if is_active { None } else { Some(Utc::now() - chrono::Duration::minutes(1)) },
            last_activity_at: Utc::now(),
            students_count: 0,
            total_translations: 0,
            is_active,
            quality: SessionQuality::Unknown,
            quality_reason: None,
        }
    }

    #[test]
    fn teacher_id_reactivates_active_session() {
        let row = base_session(true);
        let decision = resolve_teacher_id_session(Some(&row), Utc::now());
        assert_eq!(decision, ResolveDecision::Reactivate(row.id));
    }

    #[test]
    fn teacher_id_reactivates_within_fixed_ten_minute_window() {
        let mut row = base_session(false);
        row.end_time = Some(Utc::now() - chrono::Duration::minutes(9));
        let decision = resolve_teacher_id_session(Some(&row), Utc::now());
        assert_eq!(decision, ResolveDecision::Reactivate(row.id));
    }

    #[test]
    fn teacher_id_ignores_language_mismatch() {
        let mut row = base_session(false);
        row.teacher_language = Some("en-US".into());
        row.end_time = Some(Utc::now() - chrono::Duration::minutes(1));
        // The reconnecting teacher's languageCode ("fr") differs from the
        // stored session's, but teacherId resolution doesn't look at language.
        let decision = resolve_teacher_id_session(Some(&row), Utc::now());
        assert_eq!(decision, ResolveDecision::Reactivate(row.id));
    }

    #[test]
    fn teacher_id_creates_new_outside_fixed_window() {
        let mut row = base_session(false);
        row.end_time = Some(Utc::now() - chrono::Duration::minutes(30));
        let decision = resolve_teacher_id_session(Some(&row), Utc::now());
        assert_eq!(decision, ResolveDecision::CreateNew);
    }

    #[test]
    fn teacher_id_creates_new_with_no_existing_session() {
        let decision = resolve_teacher_id_session(None, Utc::now());
        assert_eq!(decision, ResolveDecision::CreateNew);
    }

    #[test]
    fn teacher_language_reactivates_sole_fresh_candidate() {
        let row = base_session(true);
        let resolution = resolve_teacher_language_session(&[row.clone()], StdDuration::from_secs(300), Utc::now());
        assert_eq!(resolution.decision, ResolveDecision::Reactivate(row.id));
        assert!(resolution.sessions_to_end.is_empty());
    }

    #[test]
    fn teacher_language_picks_newest_and_ends_older_duplicates() {
        let mut older = base_session(true);
        older.start_time = Utc::now() - chrono::Duration::minutes(5);
        let mut newer = base_session(true);
        newer.start_time = Utc::now() - chrono::Duration::seconds(10);

        let resolution = resolve_teacher_language_session(
            &[older.clone(), newer.clone()],
            StdDuration::from_secs(300),
            Utc::now(),
        );
        assert_eq!(resolution.decision, ResolveDecision::Reactivate(newer.id));
        assert_eq!(resolution.sessions_to_end, vec![older.id]);
    }

    #[test]
    fn teacher_language_creates_new_when_nothing_is_fresh() {
        let mut row = base_session(true);
        row.last_activity_at = Utc::now() - chrono::Duration::minutes(30);
        let resolution = resolve_teacher_language_session(&[row], StdDuration::from_secs(300), Utc::now());
        assert_eq!(resolution.decision, ResolveDecision::CreateNew);
        assert!(resolution.sessions_to_end.is_empty());
    }

    #[test]
    fn teacher_language_creates_new_with_no_candidates() {
        let resolution = resolve_teacher_language_session(&[], StdDuration::from_secs(300), Utc::now());
        assert_eq!(resolution.decision, ResolveDecision::CreateNew);
    }

    #[test]
    fn classify_too_short_wins_over_everything_else() {
        let q = classify_quality(chrono::Duration::seconds(5), 3, 10, 10);
        assert_eq!(q, SessionQuality::TooShort);
    }

    #[test]
    fn classify_no_students_when_nobody_joined() {
        let q = classify_quality(chrono::Duration::minutes(5), 0, 0, 0);
        assert_eq!(q, SessionQuality::NoStudents);
    }

    #[test]
    fn classify_no_activity_when_students_but_nothing_happened() {
        let q = classify_quality(chrono::Duration::minutes(5), 2, 0, 0);
        assert_eq!(q, SessionQuality::NoActivity);
    }

    #[test]
    fn classify_real_when_translation_happened() {
        let q = classify_quality(chrono::Duration::minutes(5), 2, 3, 1);
        assert_eq!(q, SessionQuality::Real);
    }

    #[test]
    fn teacher_disconnect_ends_empty_very_short_anonymous_session() {
        let decision = teacher_disconnect_policy(
            chrono::Duration::seconds(2),
            0,
            false,
            StdDuration::from_secs(5),
        );
        assert_eq!(decision, TeacherDisconnectDecision::EndImmediately);
    }

    #[test]
    fn teacher_disconnect_allows_grace_when_students_present() {
        let decision = teacher_disconnect_policy(
            chrono::Duration::seconds(2),
            1,
            false,
            StdDuration::from_secs(5),
        );
        assert_eq!(decision, TeacherDisconnectDecision::AllowGrace);
    }
}
