//! Connection health monitor (component C5).
//!
//! Tracks the last pong seen per connection and periodically pings every
//! registered connection, marking ones that go quiet as unhealthy so the
//! session lifecycle manager (C9) can decide whether to start a
//! reconnection grace period.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

use relay_core::protocol::outbound::PingFrame;
use relay_core::protocol::Outbound;

use crate::registry::ConnectionRegistry;

#[derive(Default)]
pub struct HealthMonitor {
    last_pong: DashMap<Uuid, Instant>,
}

impl HealthMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn note_connected(&self, connection_id: Uuid) {
        self.last_pong.insert(connection_id, Instant::now());
    }

    pub fn note_pong(&self, connection_id: Uuid) {
        self.last_pong.insert(connection_id, Instant::now());
    }

    pub fn forget(&self, connection_id: Uuid) {
        self.last_pong.remove(&connection_id);
    }

    pub fn is_healthy(&self, connection_id: Uuid, timeout: Duration) -> bool {
        self.last_pong
            .get(&connection_id)
            .map(|t| t.elapsed() < timeout)
            .unwrap_or(false)
    }

    /// Pings every tracked connection and returns the ids that have gone
    /// silent past `timeout` since their last pong.
    pub fn sweep(
        &self,
        registry: &ConnectionRegistry,
        timeout: Duration,
    ) -> Vec<Uuid> {
        let mut stale = Vec::new();
        let now_millis = chrono::Utc::now().timestamp_millis();
        for entry in self.last_pong.iter() {
            let connection_id = *entry.key();
            if entry.value().elapsed() >= timeout {
                stale.push(connection_id);
                continue;
            }
            if let Some(handle) = registry.get(connection_id) {
                let _ = handle.try_send(Outbound::Ping(PingFrame { timestamp: now_millis }));
                let _ = handle.try_send_raw_ping();
            }
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_connection_is_healthy() {
        let monitor = HealthMonitor::new();
        let id = Uuid::new_v4();
        monitor.note_connected(id);
        assert!(monitor.is_healthy(id, Duration::from_secs(30)));
    }

    #[test]
    fn untracked_connection_is_unhealthy() {
        let monitor = HealthMonitor::new();
        assert!(!monitor.is_healthy(Uuid::new_v4(), Duration::from_secs(30)));
    }

    #[test]
    fn sweep_flags_stale_connections() {
        let monitor = HealthMonitor::new();
        let registry = ConnectionRegistry::new();
        let id = Uuid::new_v4();
        monitor.last_pong.insert(id, Instant::now() - Duration::from_secs(60));
        let stale = monitor.sweep(&registry, Duration::from_secs(30));
        assert_eq!(stale, vec![id]);
    }
}
