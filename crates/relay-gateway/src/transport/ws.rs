//! WebSocket handler (component C11).
//!
//! Responsibilities: accept the upgrade, resolve an optional `?code=`
//! classroom code up front, run the per-connection read/write loop with a
//! decode-once pipeline into the dispatcher (C6), and apply the teacher
//! disconnect/grace policy on close. Same "writer task behind an mpsc
//! channel, tokio::select! over inbound/ping/idle" shape the donor used for
//! its Sprint 1 socket loop.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use relay_core::protocol::outbound::ErrorFrame;
use relay_core::protocol::{Outbound, RawFrame};

use crate::app_state::AppState;
use crate::lifecycle::{teacher_disconnect_policy, TeacherDisconnectDecision};
use crate::registry::Role;
use crate::store::SessionQuality;

const CLOSE_POLICY_VIOLATION: u16 = 1008;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub code: Option<String>,
    pub class: Option<String>,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(q): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, q, socket))
}

async fn handle_socket(state: AppState, q: WsQuery, socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    let span = tracing::info_span!("ws_connection", connection = %connection_id);
    run_connection(state, q, connection_id, socket).instrument(span).await;
}

async fn run_connection(state: AppState, q: WsQuery, connection_id: Uuid, mut socket: WebSocket) {
    let classroom_code = q.code.or(q.class);

    let session_id = if let Some(code) = &classroom_code {
        match state.directory().get_by_code(code) {
            Some(sid) => sid,
            None => {
                tokio::time::sleep(state.cfg().invalid_classroom_message_delay).await;
                let _ = send_text(&mut socket, &Outbound::Error(ErrorFrame { code: "INVALID_CLASSROOM" })).await;
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: CLOSE_POLICY_VIOLATION,
                        reason: "invalid classroom code".into(),
                    })))
                    .await;
                return;
            }
        }
    } else {
        Uuid::new_v4()
    };

    state.metrics().ws_upgrades.inc(&[]);
    state.metrics().ws_active_connections.inc(&[]);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(1024);
    let (close_tx, mut close_rx) = mpsc::channel::<(u16, String)>(1);
    let (raw_ping_tx, mut raw_ping_rx) = mpsc::channel::<()>(1);

    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = out_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            let Ok(text) = frame.to_json_string() else { continue };
                            if ws_tx.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                ping = raw_ping_rx.recv() => {
                    if ping.is_none() {
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
                signal = close_rx.recv() => {
                    if let Some((code, reason)) = signal {
                        let _ = ws_tx
                            .send(Message::Close(Some(CloseFrame { code, reason: reason.into() })))
                            .await;
                    }
                    break;
                }
            }
        }
    });

    let registry = state.registry().clone();
    registry.register(connection_id, session_id, Role::Unset, None, out_tx.clone(), raw_ping_tx);
    if let Some(code) = &classroom_code {
        registry.set_classroom_code(connection_id, Some(code.clone()));
    }
    state.health().note_connected(connection_id);

    let mut ping_tick = tokio::time::interval(state.cfg().health_check_interval);

    loop {
        tokio::select! {
            _ = ping_tick.tick() => {
                let stale = state.health().sweep(&registry, state.cfg().health_check_interval * 3);
                for stale_id in stale {
                    if let Some(handle) = registry.unregister(stale_id) {
                        state.health().forget(stale_id);
                        state.metrics().ws_active_connections.dec(&[]);
                        on_disconnect(&state, &handle).await;
                    }
                }
            }

            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&state, connection_id, &text, &close_tx).await;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        state.health().note_pong(connection_id);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    if let Some(handle) = registry.unregister(connection_id) {
        state.health().forget(connection_id);
        state.dispatcher().forget(connection_id);
        state.metrics().ws_active_connections.dec(&[]);
        on_disconnect(&state, &handle).await;
    }
    writer.abort();
}

async fn handle_frame(
    state: &AppState,
    connection_id: Uuid,
    text: &str,
    close_tx: &mpsc::Sender<(u16, String)>,
) {
    let frame = match RawFrame::parse(text) {
        Ok(f) => f,
        Err(e) => {
            state.metrics().handler_errors.inc(&[("reason", "decode")]);
            tracing::warn!(%connection_id, error = %e, "failed to decode inbound frame");
            return;
        }
    };

    let start = std::time::Instant::now();
    let message_type = frame.frame_type.clone();
    if let Err(e) = state.dispatcher().dispatch(state, connection_id, &frame).await {
        state.metrics().handler_errors.inc(&[("message_type", &message_type)]);
        tracing::warn!(%connection_id, error = %e, message_type, "handler failed");
        if matches!(e.client_code(), relay_core::error::ClientCode::SessionExpired) {
            let delay = state.cfg().session_expired_message_delay;
            let close_tx = close_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = close_tx.send((1008, "session expired".to_string())).await;
            });
        }
    }
    state
        .metrics()
        .dispatch_duration
        .observe(&[("message_type", &message_type)], start.elapsed());
}

async fn send_text(socket: &mut WebSocket, frame: &Outbound) -> Result<(), axum::Error> {
    let text = frame.to_json_string().unwrap_or_default();
    socket.send(Message::Text(text)).await
}

/// Applies the teacher disconnect policy (§4.8) and the student
/// "all-students-left" transition; the lifecycle sweep still owns the
/// slower grace-period expiry.
async fn on_disconnect(state: &AppState, handle: &crate::registry::ConnectionHandle) {
    if handle.role != Role::Teacher {
        if state.registry().session_is_empty(handle.session_id) {
            tracing::debug!(session_id = %handle.session_id, "last student left the classroom");
        }
        return;
    }

    let Ok(Some(session)) = state.store().get_session(handle.session_id).await else {
        return;
    };
    if !session.is_active {
        return;
    }
    let age = chrono::Utc::now() - session.start_time;
    let decision = teacher_disconnect_policy(
        age,
        session.students_count,
        session.teacher_id.is_some(),
        state.cfg().session_very_short_threshold,
    );
    if decision == TeacherDisconnectDecision::EndImmediately {
        let _ = state
            .store()
            .end_session(handle.session_id, SessionQuality::TooShort, Some("Teacher disconnected, session too short"))
            .await;
    }
}
