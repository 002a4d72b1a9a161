//! `audio` handler (§4.5.7): teacher-only, acknowledged but otherwise inert.
//! Client-side transcription is the supported path; this exists for forward
//! compatibility with a future server-side STT pipeline.

use async_trait::async_trait;
use uuid::Uuid;

use relay_core::error::Result;
use relay_core::protocol::RawFrame;

use crate::app_state::AppState;
use crate::dispatch::MessageHandler;
use crate::registry::Role;

pub struct AudioHandler;

#[async_trait]
impl MessageHandler for AudioHandler {
    fn message_type(&self) -> &'static str {
        "audio"
    }

    async fn handle(&self, state: &AppState, connection_id: Uuid, frame: &RawFrame) -> Result<()> {
        let Some(conn) = state.registry().get(connection_id) else {
            return Ok(());
        };
        if conn.role != Role::Teacher {
            return Ok(());
        }
        let audio_data: Option<String> = frame.field("data")?;
        if let Some(data) = audio_data {
            if data.len() < state.cfg().min_audio_data_length {
                tracing::debug!(connection_id = %connection_id, "audio frame below minimum length, ignored");
            }
        }
        Ok(())
    }
}
