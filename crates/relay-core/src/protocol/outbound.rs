//! Outbound frame shapes sent to teacher/student WebSocket clients.
//!
//! Each variant serializes as a flat JSON object with `type` as the
//! discriminant, mirroring the donor's `OutgoingText{svc,type,room,data}`
//! shape but specialized per message (this protocol has no `svc`/`room`
//! concept — sessions and classrooms take their place).

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Connection(ConnectionFrame),
    ClassroomCode(ClassroomCodeFrame),
    Register(RegisterFrame),
    Settings(SettingsFrame),
    Translation(Box<TranslationFrame>),
    StudentJoined(StudentJoinedFrame),
    TtsResponse(Box<TtsResponseFrame>),
    Pong(PongFrame),
    Ping(PingFrame),
    SessionExpired(SessionExpiredFrame),
    Error(ErrorFrame),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionFrame {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomCodeFrame {
    pub code: String,
    pub session_id: String,
    /// RFC3339 timestamp.
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFrame {
    pub status: &'static str,
    pub data: RegisterData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub role: String,
    pub language_code: Option<String>,
    pub settings: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFrame {
    pub status: &'static str,
    pub settings: Value,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LatencyComponents {
    pub preparation: i64,
    pub translation: i64,
    pub tts: i64,
    pub processing: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Latency {
    pub total: i64,
    pub server_complete_time: i64,
    pub components: LatencyComponents,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechParams {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
    pub language_code: String,
    pub auto_play: bool,
}

impl SpeechParams {
    pub fn browser_speech(text: String, language_code: String) -> Self {
        Self {
            kind: "browser-speech",
            text,
            language_code,
            auto_play: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationFrame {
    pub text: String,
    pub original_text: String,
    pub source_language: String,
    pub target_language: String,
    pub tts_service_type: Option<String>,
    pub use_client_speech: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_params: Option<SpeechParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
    pub latency: Latency,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentJoinedPayload {
    pub student_id: String,
    pub name: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentJoinedFrame {
    pub payload: StudentJoinedPayload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsResponseFrame {
    pub status: &'static str,
    pub text: String,
    pub language_code: String,
    pub tts_service_type: Option<String>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_params: Option<SpeechParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_client_speech: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PongFrame {
    pub timestamp: Value,
    pub original_timestamp: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingFrame {
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExpiredFrame {
    pub code: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorFrame {
    pub code: &'static str,
}

impl Outbound {
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classroom_code_frame_serializes_camel_case() {
        let out = Outbound::ClassroomCode(ClassroomCodeFrame {
            code: "ABC123".into(),
            session_id: "s1".into(),
            expires_at: "2026-07-28T00:00:00Z".into(),
        });
        let s = out.to_json_string().expect("serializes");
        assert!(s.contains(r#""type":"classroom_code""#));
        assert!(s.contains(r#""sessionId":"s1""#));
        assert!(s.contains(r#""expiresAt""#));
    }

    #[test]
    fn error_frame_carries_stable_code() {
        let out = Outbound::Error(ErrorFrame { code: "INVALID_CLASSROOM" });
        let s = out.to_json_string().expect("serializes");
        assert_eq!(s, r#"{"type":"error","code":"INVALID_CLASSROOM"}"#);
    }

    #[test]
    fn translation_frame_omits_absent_optional_fields() {
        let out = Outbound::Translation(Box::new(TranslationFrame {
            text: "hola".into(),
            original_text: "hello".into(),
            source_language: "en-US".into(),
            target_language: "es".into(),
            tts_service_type: None,
            use_client_speech: false,
            speech_params: None,
            audio_data: None,
            latency: Latency {
                total: 120,
                server_complete_time: 120,
                components: LatencyComponents {
                    preparation: 5,
                    translation: 80,
                    tts: 30,
                    processing: 5,
                },
            },
        }));
        let s = out.to_json_string().expect("serializes");
        assert!(!s.contains("audioData"));
        assert!(!s.contains("speechParams"));
    }
}
