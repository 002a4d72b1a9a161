//! `transcription` handler (§4.5.5): teacher-only, persists a transcript and
//! delegates fan-out to the translation orchestrator (C8).

use async_trait::async_trait;
use uuid::Uuid;

use relay_core::error::Result;
use relay_core::protocol::RawFrame;

use crate::app_state::AppState;
use crate::dispatch::MessageHandler;
use crate::registry::Role;

pub struct TranscriptionHandler;

#[async_trait]
impl MessageHandler for TranscriptionHandler {
    fn message_type(&self) -> &'static str {
        "transcription"
    }

    async fn handle(&self, state: &AppState, connection_id: Uuid, frame: &RawFrame) -> Result<()> {
        let Some(conn) = state.registry().get(connection_id) else {
            return Ok(());
        };
        if conn.role != Role::Teacher {
            return Ok(());
        }

        let text: String = frame.require("text")?;
        let use_client_speech: bool = frame.field("useClientSpeech")?.unwrap_or(false);
        let teacher_language = conn.language_code.clone().unwrap_or_else(|| "en-US".to_string());

        state.store().insert_transcript(conn.session_id, &teacher_language, &text).await?;

        if state.registry().students_in_session(conn.session_id).is_empty() {
            return Ok(());
        }

        state.orchestrator().fan_out(conn.session_id, &teacher_language, &text, use_client_speech).await;

        if state.cfg().enable_detailed_translation_logging {
            tracing::debug!(session_id = %conn.session_id, teacher_language, text_len = text.len(), "transcription fanned out");
        }

        Ok(())
    }
}
