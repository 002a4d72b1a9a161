//! `settings` handler (§4.5.4): merges client settings into the connection.

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use relay_core::error::Result;
use relay_core::protocol::{Outbound, RawFrame};

use crate::app_state::AppState;
use crate::dispatch::MessageHandler;

pub struct SettingsHandler;

#[async_trait]
impl MessageHandler for SettingsHandler {
    fn message_type(&self) -> &'static str {
        "settings"
    }

    async fn handle(&self, state: &AppState, connection_id: Uuid, frame: &RawFrame) -> Result<()> {
        let incoming: Value = frame.field::<Value>("settings")?.unwrap_or(Value::Null);
        let tts_service_type: Option<String> = frame.field("ttsServiceType")?;

        let mut merged = state.registry().settings(connection_id);
        if !merged.is_object() {
            merged = json!({});
        }
        if let Value::Object(incoming_map) = incoming {
            if let Some(merged_map) = merged.as_object_mut() {
                for (k, v) in incoming_map {
                    merged_map.insert(k, v);
                }
            }
        }
        if let Some(tts) = tts_service_type {
            if let Some(merged_map) = merged.as_object_mut() {
                merged_map.insert("ttsServiceType".into(), Value::String(tts));
            }
        }
        state.registry().set_settings(connection_id, merged.clone());

        if let Some(handle) = state.registry().get(connection_id) {
            let _ = handle.try_send(Outbound::Settings(relay_core::protocol::outbound::SettingsFrame {
                status: "success",
                settings: merged,
            }));
        }
        Ok(())
    }
}
