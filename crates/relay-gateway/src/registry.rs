//! Connection registry (component C4).
//!
//! Tracks every live WebSocket connection's outbound writer queue, keyed by
//! connection id, plus a session -> connection-set index so fan-out (C8) can
//! find every listener in a classroom without scanning. Same "DashMap +
//! DashSet, no torn rows" shape the donor used for its presence tables.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use relay_core::protocol::Outbound;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Teacher,
    Student,
    Unset,
}

#[derive(Clone)]
pub struct ConnectionHandle {
    pub connection_id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub language_code: Option<String>,
    pub classroom_code: Option<String>,
    pub student_counted: bool,
    sender: mpsc::Sender<Outbound>,
    raw_ping_sender: mpsc::Sender<()>,
}

impl ConnectionHandle {
    /// Best-effort enqueue; a full or closed queue is logged by the caller,
    /// never awaited on, so one slow reader can't stall the fan-out.
    pub fn try_send(&self, frame: Outbound) -> Result<(), mpsc::error::TrySendError<Outbound>> {
        self.sender.try_send(frame)
    }

    /// Best-effort request for the writer task to send a low-level WebSocket
    /// `Message::Ping`, alongside (not instead of) the application-level
    /// `ping` JSON frame.
    pub fn try_send_raw_ping(&self) -> Result<(), mpsc::error::TrySendError<()>> {
        self.raw_ping_sender.try_send(())
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, ConnectionHandle>,
    by_session: DashMap<Uuid, DashSet<Uuid>>,
    settings: DashMap<Uuid, Value>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(
        &self,
        connection_id: Uuid,
        session_id: Uuid,
        role: Role,
        language_code: Option<String>,
        sender: mpsc::Sender<Outbound>,
        raw_ping_sender: mpsc::Sender<()>,
    ) -> ConnectionHandle {
        let handle = ConnectionHandle {
            connection_id,
            session_id,
            role,
            language_code,
            classroom_code: None,
            student_counted: false,
            sender,
            raw_ping_sender,
        };
        self.connections.insert(connection_id, handle.clone());
        self.by_session
            .entry(session_id)
            .or_default()
            .insert(connection_id);
        handle
    }

    pub fn update_language(&self, connection_id: Uuid, language_code: Option<String>) {
        if let Some(mut entry) = self.connections.get_mut(&connection_id) {
            entry.language_code = language_code;
        }
    }

    pub fn update_role(&self, connection_id: Uuid, role: Role) {
        if let Some(mut entry) = self.connections.get_mut(&connection_id) {
            entry.role = role;
        }
    }

    pub fn set_classroom_code(&self, connection_id: Uuid, code: Option<String>) {
        if let Some(mut entry) = self.connections.get_mut(&connection_id) {
            entry.classroom_code = code;
        }
    }

    pub fn set_student_counted(&self, connection_id: Uuid, counted: bool) {
        if let Some(mut entry) = self.connections.get_mut(&connection_id) {
            entry.student_counted = counted;
        }
    }

    pub fn set_settings(&self, connection_id: Uuid, settings: Value) {
        self.settings.insert(connection_id, settings);
    }

    pub fn settings(&self, connection_id: Uuid) -> Value {
        self.settings.get(&connection_id).map(|v| v.clone()).unwrap_or(Value::Null)
    }

    /// Re-homes a connection to another session, e.g. a student joining the
    /// teacher's classroom (§4.7). Removes it from the old session's index
    /// and inserts it into the new one.
    pub fn rehome(&self, connection_id: Uuid, new_session_id: Uuid) {
        let old_session_id = self.connections.get(&connection_id).map(|e| e.session_id);
        if let Some(mut entry) = self.connections.get_mut(&connection_id) {
            entry.session_id = new_session_id;
        }
        if let Some(old) = old_session_id {
            if old != new_session_id {
                if let Some(set) = self.by_session.get(&old) {
                    set.remove(&connection_id);
                }
                self.by_session.entry(new_session_id).or_default().insert(connection_id);
            }
        }
    }

    pub fn unregister(&self, connection_id: Uuid) -> Option<ConnectionHandle> {
        let removed = self.connections.remove(&connection_id).map(|(_, h)| h);
        if let Some(handle) = &removed {
            if let Some(set) = self.by_session.get(&handle.session_id) {
                set.remove(&connection_id);
            }
        }
        self.settings.remove(&connection_id);
        removed
    }

    pub fn get(&self, connection_id: Uuid) -> Option<ConnectionHandle> {
        self.connections.get(&connection_id).map(|e| e.clone())
    }

    /// Snapshot of every connection in a session. Cloned out of the map so
    /// callers never hold a lock while awaiting a send.
    pub fn connections_in_session(&self, session_id: Uuid) -> Vec<ConnectionHandle> {
        self.by_session
            .get(&session_id)
            .map(|set| {
                set.iter()
                    .filter_map(|id| self.connections.get(&id).map(|e| e.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn students_in_session(&self, session_id: Uuid) -> Vec<ConnectionHandle> {
        self.connections_in_session(session_id)
            .into_iter()
            .filter(|c| c.role == Role::Student)
            .collect()
    }

    /// Every teacher connection in a session, e.g. the same teacher open in
    /// more than one tab. Used to fan `student_joined` to all of them rather
    /// than just the first match.
    pub fn teachers_in_session(&self, session_id: Uuid) -> Vec<ConnectionHandle> {
        self.connections_in_session(session_id)
            .into_iter()
            .filter(|c| c.role == Role::Teacher)
            .collect()
    }

    pub fn session_is_empty(&self, session_id: Uuid) -> bool {
        self.by_session
            .get(&session_id)
            .map(|set| set.is_empty())
            .unwrap_or(true)
    }

    pub fn active_connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn active_role_count(&self, role: Role) -> usize {
        self.connections.iter().filter(|e| e.role == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_and_rx(
        registry: &ConnectionRegistry,
        session_id: Uuid,
        role: Role,
    ) -> (Uuid, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(8);
        let (ping_tx, _ping_rx) = mpsc::channel(1);
        let conn_id = Uuid::new_v4();
        registry.register(conn_id, session_id, role, None, tx, ping_tx);
        (conn_id, rx)
    }

    #[test]
    fn registers_and_looks_up_by_session() {
        let registry = ConnectionRegistry::new();
        let session_id = Uuid::new_v4();
        let (teacher_id, _rx1) = handle_and_rx(&registry, session_id, Role::Teacher);
        let (_student_id, _rx2) = handle_and_rx(&registry, session_id, Role::Student);

        assert_eq!(registry.connections_in_session(session_id).len(), 2);
        assert_eq!(registry.students_in_session(session_id).len(), 1);
        assert_eq!(registry.teachers_in_session(session_id).into_iter().next().unwrap().connection_id, teacher_id);
    }

    #[test]
    fn fans_out_to_every_teacher_connection_in_a_session() {
        let registry = ConnectionRegistry::new();
        let session_id = Uuid::new_v4();
        let (first_teacher, _rx1) = handle_and_rx(&registry, session_id, Role::Teacher);
        let (second_teacher, _rx2) = handle_and_rx(&registry, session_id, Role::Teacher);
        let (_student_id, _rx3) = handle_and_rx(&registry, session_id, Role::Student);

        let teachers = registry.teachers_in_session(session_id);
        let ids: std::collections::HashSet<_> = teachers.iter().map(|c| c.connection_id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first_teacher));
        assert!(ids.contains(&second_teacher));
    }

    #[test]
    fn unregister_empties_session_index() {
        let registry = ConnectionRegistry::new();
        let session_id = Uuid::new_v4();
        let (conn_id, _rx) = handle_and_rx(&registry, session_id, Role::Teacher);
        assert!(!registry.session_is_empty(session_id));
        registry.unregister(conn_id);
        assert!(registry.session_is_empty(session_id));
        assert!(registry.get(conn_id).is_none());
    }
}
