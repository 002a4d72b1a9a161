//! `register` handler (§4.5.1): resolves or creates a session for a teacher,
//! or validates + re-homes a student into one.

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use relay_core::error::{RelayError, Result};
use relay_core::protocol::outbound::{
    ClassroomCodeFrame, ConnectionFrame, RegisterData, RegisterFrame, StudentJoinedFrame, StudentJoinedPayload,
};
use relay_core::protocol::{Outbound, RawFrame};

use crate::app_state::AppState;
use crate::dispatch::MessageHandler;
use crate::lifecycle::{resolve_teacher_id_session, resolve_teacher_language_session, ResolveDecision};
use crate::registry::Role;

pub struct RegisterHandler;

#[async_trait]
impl MessageHandler for RegisterHandler {
    fn message_type(&self) -> &'static str {
        "register"
    }

    async fn handle(&self, state: &AppState, connection_id: Uuid, frame: &RawFrame) -> Result<()> {
        let role: String = frame.require("role")?;
        let language_code: Option<String> = frame.field("languageCode")?;
        let settings: Option<serde_json::Value> = frame.field("settings")?;

        match role.as_str() {
            "teacher" => handle_teacher(state, connection_id, frame, language_code, settings).await,
            "student" => handle_student(state, connection_id, frame, language_code, settings).await,
            other => Err(RelayError::BadRequest(format!("unknown role: {other}"))),
        }
    }
}

async fn handle_teacher(
    state: &AppState,
    connection_id: Uuid,
    frame: &RawFrame,
    language_code: Option<String>,
    settings: Option<serde_json::Value>,
) -> Result<()> {
    let teacher_id: Option<String> = frame.field("teacherId")?;
    let current = state
        .registry()
        .get(connection_id)
        .ok_or_else(|| RelayError::Internal("connection missing from registry".into()))?;

    let now = chrono::Utc::now();

    let decision = if let Some(tid) = &teacher_id {
        let existing = state.store().find_session_by_teacher(tid).await?;
        resolve_teacher_id_session(existing.as_ref(), now)
    } else if let Some(language) = &language_code {
        let candidates = state.store().active_sessions_by_teacher_language(language).await?;
        let resolution = resolve_teacher_language_session(
            &candidates,
            state.cfg().teacher_reconnection_grace_period,
            now,
        );
        for stale_id in resolution.sessions_to_end {
            state.lifecycle().classify_and_end(stale_id, Some("Teacher created new session")).await?;
        }
        resolution.decision
    } else {
        ResolveDecision::CreateNew
    };

    let session = match decision {
        ResolveDecision::Reactivate(session_id) => {
            state.store().reactivate_session(session_id).await?;
            state.store().get_session(session_id).await?.ok_or_else(|| RelayError::Internal("reactivated session vanished".into()))?
        }
        ResolveDecision::CreateNew => {
            state.store().create_session(teacher_id.as_deref(), language_code.as_deref()).await?
        }
    };

    if session.id != current.session_id {
        state.registry().rehome(connection_id, session.id);
    }
    state.registry().update_role(connection_id, Role::Teacher);
    state.registry().update_language(connection_id, language_code.clone());
    state.registry().set_settings(connection_id, settings.clone().unwrap_or(json!({})));

    let code = state.directory().create_or_reuse(session.id);
    state.store().set_class_code(session.id, &code).await?;
    state.registry().set_classroom_code(connection_id, Some(code.clone()));

    let expires_at = state
        .directory()
        .expires_at(&code)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    send_to(state, connection_id, Outbound::Connection(ConnectionFrame { session_id: session.id.to_string() }));
    send_to(
        state,
        connection_id,
        Outbound::Register(RegisterFrame {
            status: "success",
            data: RegisterData {
                role: "teacher".to_string(),
                language_code,
                settings: settings.unwrap_or(json!({})),
            },
        }),
    );
    send_to(
        state,
        connection_id,
        Outbound::ClassroomCode(ClassroomCodeFrame {
            code,
            session_id: session.id.to_string(),
            expires_at,
        }),
    );

    let _ = frame;
    Ok(())
}

async fn handle_student(
    state: &AppState,
    connection_id: Uuid,
    frame: &RawFrame,
    language_code: Option<String>,
    settings: Option<serde_json::Value>,
) -> Result<()> {
    let classroom_code: Option<String> = frame.field("classroomCode")?;
    let name: Option<String> = frame.field("name")?;

    let current = state
        .registry()
        .get(connection_id)
        .ok_or_else(|| RelayError::Internal("connection missing from registry".into()))?;

    let session_id = if let Some(code) = &classroom_code {
        match state.directory().get_by_code(code) {
            Some(sid) => sid,
            None => {
                tokio::time::sleep(state.cfg().invalid_classroom_message_delay).await;
                send_to(state, connection_id, Outbound::Error(relay_core::protocol::outbound::ErrorFrame {
                    code: "INVALID_CLASSROOM",
                }));
                return Err(RelayError::InvalidClassroom);
            }
        }
    } else {
        current.session_id
    };

    if session_id != current.session_id {
        state.registry().rehome(connection_id, session_id);
    }
    state.registry().update_role(connection_id, Role::Student);
    state.registry().update_language(connection_id, language_code.clone());
    state.registry().set_settings(connection_id, settings.clone().unwrap_or(json!({})));

    let session = state
        .store()
        .get_session(session_id)
        .await?
        .ok_or(RelayError::SessionExpired)?;

    if session.students_count == 0 {
        state.store().reanchor_start_time(session_id).await?;
    }
    if !current.student_counted {
        state.store().increment_students_count(session_id, 1).await?;
        state.registry().set_student_counted(connection_id, true);
    }
    if let Some(lang) = &language_code {
        state.store().set_student_language(session_id, lang).await?;
    }
    state.store().touch_activity(session_id).await?;

    send_to(state, connection_id, Outbound::Connection(ConnectionFrame { session_id: session_id.to_string() }));
    send_to(
        state,
        connection_id,
        Outbound::Register(RegisterFrame {
            status: "success",
            data: RegisterData {
                role: "student".to_string(),
                language_code,
                settings: settings.unwrap_or(json!({})),
            },
        }),
    );

    let joined_language_code = state.registry().get(connection_id).and_then(|c| c.language_code);
    for teacher in state.registry().teachers_in_session(session_id) {
        let _ = teacher.try_send(Outbound::StudentJoined(StudentJoinedFrame {
            payload: StudentJoinedPayload {
                student_id: connection_id.to_string(),
                name: name.clone(),
                language_code: joined_language_code.clone(),
            },
        }));
    }

    Ok(())
}

fn send_to(state: &AppState, connection_id: Uuid, frame: Outbound) {
    if let Some(handle) = state.registry().get(connection_id) {
        if handle.try_send(frame).is_err() {
            state.metrics().handler_errors.inc(&[("handler", "register"), ("reason", "send_failed")]);
        }
    }
}

