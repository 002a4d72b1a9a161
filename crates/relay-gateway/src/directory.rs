//! Classroom code directory.
//!
//! Maps short human-typeable codes to session ids, the same "generate with
//! rejection sampling, look up from a concurrent map, sweep on a timer" shape
//! the donor's presence registry used for room ids, specialized for codes
//! that expire and can be reused by an active session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use uuid::Uuid;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;
const MAX_GENERATION_ATTEMPTS: usize = 4096;

#[derive(Debug, Clone)]
struct CodeEntry {
    session_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// Concurrent classroom-code directory (component C3).
pub struct ClassroomDirectory {
    by_code: DashMap<String, CodeEntry>,
    by_session: DashMap<Uuid, String>,
    ttl: chrono::Duration,
}

impl ClassroomDirectory {
    pub fn new(ttl: std::time::Duration) -> Arc<Self> {
        Arc::new(Self {
            by_code: DashMap::new(),
            by_session: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(2)),
        })
    }

    fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Returns the existing code for `session_id` if one is still valid,
    /// otherwise mints a fresh one via rejection sampling.
    pub fn create_or_reuse(&self, session_id: Uuid) -> String {
        if let Some(existing) = self.by_session.get(&session_id) {
            let code = existing.value().clone();
            if let Some(entry) = self.by_code.get(&code) {
                if entry.expires_at > Utc::now() {
                    return code;
                }
            }
        }

        let mut rng = rand::thread_rng();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let candidate = generate_code(&mut rng);
            if self.by_code.contains_key(&candidate) {
                if attempts >= MAX_GENERATION_ATTEMPTS {
                    // The 6-char, 32-symbol keyspace (~1.07e9 codes) is never
                    // actually exhausted at any realistic concurrent-session
                    // count; a sweep of expired entries (here, opportunistically,
                    // and periodically via `sweep_expired`) keeps it from
                    // filling up. Evict the oldest-expiring entry rather than
                    // growing the code past the `^[A-Z0-9]{6}$` invariant.
                    self.sweep_expired();
                }
                continue;
            }
            let expires_at = Utc::now() + self.ttl();
            self.by_code.insert(
                candidate.clone(),
                CodeEntry { session_id, expires_at },
            );
            self.by_session.insert(session_id, candidate.clone());
            return candidate;
        }
    }

    /// Evicts the entry immediately if expired rather than waiting for the
    /// next periodic sweep.
    pub fn is_valid(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }

    pub fn get_by_code(&self, code: &str) -> Option<Uuid> {
        let entry = self.by_code.get(code)?;
        if entry.expires_at > Utc::now() {
            return Some(entry.session_id);
        }
        let session_id = entry.session_id;
        drop(entry);
        self.by_code.remove(code);
        self.by_session.remove(&session_id);
        None
    }

    pub fn get_code_by_session(&self, session_id: Uuid) -> Option<String> {
        self.by_session.get(&session_id).map(|c| c.clone())
    }

    pub fn expires_at(&self, code: &str) -> Option<DateTime<Utc>> {
        self.by_code.get(code).map(|e| e.expires_at)
    }

    /// Restores a code mapping after a session row is reloaded from storage
    /// (e.g. server restart), rather than minting a brand new code.
    pub fn restore(&self, code: String, session_id: Uuid, expires_at: DateTime<Utc>) {
        self.by_code.insert(code.clone(), CodeEntry { session_id, expires_at });
        self.by_session.insert(session_id, code);
    }

    /// Drops codes and sessions mappings once they have expired. Returns the
    /// number of codes evicted.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .by_code
            .iter()
            .filter(|e| e.expires_at <= now)
            .map(|e| e.key().clone())
            .collect();
        for code in &expired {
            if let Some((_, entry)) = self.by_code.remove(code) {
                self.by_session.remove(&entry.session_id);
            }
        }
        expired.len()
    }

    pub fn active_count(&self) -> usize {
        self.by_code.len()
    }
}

fn generate_code(rng: &mut impl Rng) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_unique_code_and_resolves_both_directions() {
        let dir = ClassroomDirectory::new(std::time::Duration::from_secs(3600));
        let session_id = Uuid::new_v4();
        let code = dir.create_or_reuse(session_id);
        assert_eq!(code.len(), CODE_LEN);
        assert!(dir.is_valid(&code));
        assert_eq!(dir.get_by_code(&code), Some(session_id));
        assert_eq!(dir.get_code_by_session(session_id), Some(code));
    }

    #[test]
    fn reuses_code_for_same_session() {
        let dir = ClassroomDirectory::new(std::time::Duration::from_secs(3600));
        let session_id = Uuid::new_v4();
        let first = dir.create_or_reuse(session_id);
        let second = dir.create_or_reuse(session_id);
        assert_eq!(first, second);
    }

    #[test]
    fn sweep_evicts_expired_entries() {
        let dir = ClassroomDirectory::new(std::time::Duration::from_millis(1));
        let session_id = Uuid::new_v4();
        let code = dir.create_or_reuse(session_id);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(dir.sweep_expired(), 1);
        assert!(!dir.is_valid(&code));
        assert_eq!(dir.get_by_code(&code), None);
    }

    #[test]
    fn unknown_code_is_invalid() {
        let dir = ClassroomDirectory::new(std::time::Duration::from_secs(3600));
        assert!(!dir.is_valid("ZZZZZZ"));
    }
}
