//! Active-count cache (component C10).
//!
//! Scrapes the durable store on a timer and caches the results in atomics so
//! the health endpoint (C5/§5.1) never pays a database round trip per
//! request, the same coalesced-read shape the donor used for its draining
//! gauge.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::store::Store;

#[derive(Default)]
pub struct ActiveCountCache {
    active_sessions: AtomicUsize,
    active_students: AtomicUsize,
}

impl ActiveCountCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    pub fn active_students(&self) -> usize {
        self.active_students.load(Ordering::Relaxed)
    }

    pub async fn refresh(&self, store: &Store) -> relay_core::error::Result<()> {
        let sessions = store.active_sessions_for_sweep().await?;
        let students: i64 = sessions.iter().map(|s| s.students_count as i64).sum();
        self.active_sessions.store(sessions.len(), Ordering::Relaxed);
        self.active_students.store(students.max(0) as usize, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_zero() {
        let cache = ActiveCountCache::new();
        assert_eq!(cache.active_sessions(), 0);
        assert_eq!(cache.active_students(), 0);
    }
}
