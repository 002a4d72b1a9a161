//! `tts_request` handler (§4.5.6).

use async_trait::async_trait;
use uuid::Uuid;

use relay_core::error::Result;
use relay_core::protocol::outbound::TtsResponseFrame;
use relay_core::protocol::{Outbound, RawFrame};

use crate::app_state::AppState;
use crate::dispatch::MessageHandler;

pub struct TtsRequestHandler;

#[async_trait]
impl MessageHandler for TtsRequestHandler {
    fn message_type(&self) -> &'static str {
        "tts_request"
    }

    async fn handle(&self, state: &AppState, connection_id: Uuid, frame: &RawFrame) -> Result<()> {
        let text: String = frame.require("text")?;
        let language_code: String = frame.require("languageCode")?;

        let Some(handle) = state.registry().get(connection_id) else {
            return Ok(());
        };

        let response = match state.tts().synthesize(&text, &language_code).await {
            Ok(out) if !out.audio_data_base64.is_empty() => TtsResponseFrame {
                status: "success",
                text,
                language_code,
                tts_service_type: Some(out.service_type),
                timestamp: chrono::Utc::now().timestamp_millis(),
                audio_data: Some(out.audio_data_base64),
                speech_params: None,
                error: None,
                use_client_speech: Some(false),
            },
            Ok(out) => TtsResponseFrame {
                status: "success",
                text: text.clone(),
                language_code: language_code.clone(),
                tts_service_type: Some(out.service_type),
                timestamp: chrono::Utc::now().timestamp_millis(),
                audio_data: None,
                speech_params: Some(relay_core::protocol::outbound::SpeechParams::browser_speech(text, language_code)),
                error: None,
                use_client_speech: Some(true),
            },
            Err(e) => TtsResponseFrame {
                status: "error",
                text,
                language_code,
                tts_service_type: None,
                timestamp: chrono::Utc::now().timestamp_millis(),
                audio_data: None,
                speech_params: None,
                error: Some(e.to_string()),
                use_client_speech: None,
            },
        };

        let _ = handle.try_send(Outbound::TtsResponse(Box::new(response)));
        Ok(())
    }
}
