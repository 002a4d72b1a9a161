//! Message dispatcher (component C6).
//!
//! Frames are decoded once into a [`RawFrame`](relay_core::protocol::RawFrame)
//! upstream in the transport layer; this module routes by the `type`
//! discriminant to a registered handler, the same registry-of-trait-objects
//! shape the donor used for its text/binary service tables. Two cross-cutting
//! concerns live here rather than in each handler: session validation for
//! every frame type except `register`/`ping`/`pong`, and coalesced
//! `lastActivityAt` touches for the high-frequency frame types.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use relay_core::error::{RelayError, Result};
use relay_core::protocol::outbound::SessionExpiredFrame;
use relay_core::protocol::{Outbound, RawFrame};

use crate::app_state::AppState;

#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn message_type(&self) -> &'static str;
    async fn handle(&self, state: &AppState, connection_id: Uuid, frame: &RawFrame) -> Result<()>;
}

/// Frame types allowed on a connection that has no (yet) validated session.
const SESSION_EXEMPT: [&str; 3] = ["register", "ping", "pong"];
/// Frame types whose `lastActivityAt` touch is coalesced to once per window.
const ACTIVITY_COALESCED: [&str; 3] = ["transcription", "audio", "settings"];
const ACTIVITY_COALESCE_WINDOW: Duration = Duration::from_secs(30);

#[derive(Default)]
pub struct Dispatcher {
    handlers: DashMap<&'static str, Arc<dyn MessageHandler>>,
    last_activity_touch: DashMap<Uuid, Instant>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn MessageHandler>) {
        self.handlers.insert(handler.message_type(), handler);
    }

    /// Drops the coalescing timer for a connection that has disconnected.
    pub fn forget(&self, connection_id: Uuid) {
        self.last_activity_touch.remove(&connection_id);
    }

    pub async fn dispatch(&self, state: &AppState, connection_id: Uuid, frame: &RawFrame) -> Result<()> {
        let frame_type = frame.frame_type.as_str();
        let handler = self
            .handlers
            .get(frame_type)
            .ok_or_else(|| RelayError::BadRequest(format!("unknown message type: {frame_type}")))?
            .value()
            .clone();

        if !SESSION_EXEMPT.contains(&frame_type) {
            self.require_active_session(state, connection_id).await?;
        }
        if ACTIVITY_COALESCED.contains(&frame_type) {
            self.touch_activity_coalesced(state, connection_id).await?;
        }

        handler.handle(state, connection_id, frame).await
    }

    async fn require_active_session(&self, state: &AppState, connection_id: Uuid) -> Result<()> {
        let Some(conn) = state.registry().get(connection_id) else {
            return Err(RelayError::SessionExpired);
        };
        let session = state.store().get_session(conn.session_id).await?;
        let expired = match &session {
            None => true,
            Some(row) => !row.is_active,
        };
        if expired {
            let _ = conn.try_send(Outbound::SessionExpired(SessionExpiredFrame { code: "SESSION_EXPIRED" }));
            return Err(RelayError::SessionExpired);
        }
        Ok(())
    }

    async fn touch_activity_coalesced(&self, state: &AppState, connection_id: Uuid) -> Result<()> {
        let now = Instant::now();
        let should_touch = match self.last_activity_touch.get(&connection_id) {
            Some(last) => now.duration_since(*last) >= ACTIVITY_COALESCE_WINDOW,
            None => true,
        };
        if should_touch {
            if let Some(conn) = state.registry().get(connection_id) {
                state.store().touch_activity(conn.session_id).await?;
                self.last_activity_touch.insert(connection_id, now);
            }
        }
        Ok(())
    }
}
