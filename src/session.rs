//! Cached session so a restart shows the last document again.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub const SESSION_KEY: &str = "ohp-viewer-session";
const MAX_CONTENT_SIZE: usize = 1024 * 1024;
const SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub file_name: String,
    pub path: Option<PathBuf>,
    pub content: String,
    pub hot_reload: bool,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

pub fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct SessionManager {
    max_content_size: usize,
    max_age: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self {
            max_content_size: MAX_CONTENT_SIZE,
            max_age: SESSION_DURATION,
        }
    }
}

impl SessionManager {
    /// Store the session; documents over the size limit are not cached
    pub fn save(&self, storage: &mut dyn eframe::Storage, snapshot: &SessionSnapshot) -> bool {
        if snapshot.content.len() > self.max_content_size {
            log::warn!(
                "Content of {} too large to cache ({} bytes)",
                snapshot.file_name,
                snapshot.content.len()
            );
            return false;
        }
        eframe::set_value(storage, SESSION_KEY, snapshot);
        true
    }

    /// Load the session if it is still fresh at `now`
    ///
    /// Expired or unreadable entries count as absent; the next save overwrites them.
    pub fn load(&self, storage: &dyn eframe::Storage, now: SystemTime) -> Option<SessionSnapshot> {
        let raw = storage.get_string(SESSION_KEY)?;
        if raw.is_empty() {
            return None;
        }

        let Some(snapshot) = eframe::get_value::<SessionSnapshot>(storage, SESSION_KEY) else {
            log::error!("Failed to parse cached session, ignoring it");
            return None;
        };

        let age = unix_millis(now).saturating_sub(snapshot.timestamp_ms);
        if age > self.max_age.as_millis() as u64 {
            log::info!("Cached session for {} expired", snapshot.file_name);
            return None;
        }

        Some(snapshot)
    }

    pub fn clear(&self, storage: &mut dyn eframe::Storage) {
        // eframe storage has no removal; an empty value reads back as absent
        storage.set_string(SESSION_KEY, String::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStorage(HashMap<String, String>);

    impl eframe::Storage for MemoryStorage {
        fn get_string(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }

        fn set_string(&mut self, key: &str, value: String) {
            self.0.insert(key.to_string(), value);
        }

        fn flush(&mut self) {}
    }

    fn snapshot(content: &str, saved_at: SystemTime) -> SessionSnapshot {
        SessionSnapshot {
            file_name: "notes.md".to_string(),
            path: Some(PathBuf::from("/tmp/notes.md")),
            content: content.to_string(),
            hot_reload: true,
            timestamp_ms: unix_millis(saved_at),
        }
    }

    #[test]
    fn test_fresh_session_round_trips() {
        let mut storage = MemoryStorage::default();
        let manager = SessionManager::default();
        let saved_at = UNIX_EPOCH + Duration::from_secs(1_000_000);
        let session = snapshot("# Hello", saved_at);

        assert!(manager.save(&mut storage, &session));
        let loaded = manager.load(&storage, saved_at + Duration::from_secs(60));
        assert_eq!(loaded, Some(session));
    }

    #[test]
    fn test_expired_session_is_absent() {
        let mut storage = MemoryStorage::default();
        let manager = SessionManager::default();
        let saved_at = UNIX_EPOCH + Duration::from_secs(1_000_000);
        manager.save(&mut storage, &snapshot("# Old", saved_at));

        let later = saved_at + SESSION_DURATION + Duration::from_secs(1);
        assert_eq!(manager.load(&storage, later), None);
        // still fine just inside the window
        let edge = saved_at + SESSION_DURATION;
        assert!(manager.load(&storage, edge).is_some());
    }

    #[test]
    fn test_oversized_content_is_not_cached() {
        let mut storage = MemoryStorage::default();
        let manager = SessionManager::default();
        let big = "x".repeat(MAX_CONTENT_SIZE + 1);
        assert!(!manager.save(&mut storage, &snapshot(&big, SystemTime::now())));
        assert_eq!(manager.load(&storage, SystemTime::now()), None);
    }

    #[test]
    fn test_corrupt_session_is_ignored() {
        let mut storage = MemoryStorage::default();
        eframe::Storage::set_string(&mut storage, SESSION_KEY, "not a session".to_string());
        let manager = SessionManager::default();
        assert_eq!(manager.load(&storage, SystemTime::now()), None);
    }

    #[test]
    fn test_clear_makes_session_absent() {
        let mut storage = MemoryStorage::default();
        let manager = SessionManager::default();
        let now = SystemTime::now();
        manager.save(&mut storage, &snapshot("# Hi", now));
        manager.clear(&mut storage);
        assert_eq!(manager.load(&storage, now), None);
    }
}
