//! `ping`/`pong` handlers (§4.5.2, §4.5.3).

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use relay_core::error::Result;
use relay_core::protocol::outbound::PongFrame;
use relay_core::protocol::{Outbound, RawFrame};

use crate::app_state::AppState;
use crate::dispatch::MessageHandler;

pub struct PingHandler;

#[async_trait]
impl MessageHandler for PingHandler {
    fn message_type(&self) -> &'static str {
        "ping"
    }

    async fn handle(&self, state: &AppState, connection_id: Uuid, frame: &RawFrame) -> Result<()> {
        state.health().note_pong(connection_id);
        let original: Option<Value> = frame.field("timestamp")?;
        let now = Value::from(chrono::Utc::now().timestamp_millis());
        if let Some(handle) = state.registry().get(connection_id) {
            let _ = handle.try_send(Outbound::Pong(PongFrame {
                timestamp: now,
                original_timestamp: original.unwrap_or(Value::Null),
            }));
        }
        Ok(())
    }
}

pub struct PongHandler;

#[async_trait]
impl MessageHandler for PongHandler {
    fn message_type(&self) -> &'static str {
        "pong"
    }

    async fn handle(&self, state: &AppState, connection_id: Uuid, _frame: &RawFrame) -> Result<()> {
        state.health().note_pong(connection_id);
        Ok(())
    }
}
