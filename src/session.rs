//! In-memory session storage with time-based expiry.
//!
//! A session keeps generated material around long enough to export it as a
//! notebook or ask follow-up questions. Entries expire `ttl` after creation;
//! every `save` and `get` first purges whatever has expired, so the store
//! never needs a background sweeper.

use crate::error::Lecture2CodeError;
use crate::output::{GenerationMetadata, StudyMaterial};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Opaque session identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = Lecture2CodeError;

    /// Anything that is not a UUID cannot name a live session.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Lecture2CodeError::SessionNotFound { id: s.to_string() })
    }
}

/// One stored result.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub material: StudyMaterial,
    pub metadata: GenerationMetadata,
    pub created_at: Instant,
}

/// Thread-safe map from [`SessionId`] to [`SessionEntry`].
///
/// Share it between request handlers behind an `Arc`.
#[derive(Debug)]
pub struct SessionStore {
    entries: Mutex<HashMap<SessionId, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store material under a fresh id.
    pub fn save(&self, material: StudyMaterial, metadata: GenerationMetadata) -> SessionId {
        self.save_at(material, metadata, Instant::now())
    }

    /// Look up a live session.
    ///
    /// # Errors
    /// [`Lecture2CodeError::SessionNotFound`] if the id was never issued or
    /// the entry has expired.
    pub fn get(&self, id: &SessionId) -> Result<SessionEntry, Lecture2CodeError> {
        self.get_at(id, Instant::now())
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&mut self.lock(), self.ttl, Instant::now())
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save_at(&self, material: StudyMaterial, metadata: GenerationMetadata, now: Instant) -> SessionId {
        let mut entries = self.lock();
        purge(&mut entries, self.ttl, now);

        let id = SessionId::new();
        entries.insert(
            id,
            SessionEntry {
                material,
                metadata,
                created_at: now,
            },
        );
        debug!("Saved session {} ({} live)", id, entries.len());
        id
    }

    fn get_at(&self, id: &SessionId, now: Instant) -> Result<SessionEntry, Lecture2CodeError> {
        let mut entries = self.lock();
        purge(&mut entries, self.ttl, now);
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| Lecture2CodeError::SessionNotFound { id: id.to_string() })
    }
}

fn purge(entries: &mut HashMap<SessionId, SessionEntry>, ttl: Duration, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, e| now.saturating_duration_since(e.created_at) < ttl);
    let removed = before - entries.len();
    if removed > 0 {
        debug!("Purged {} expired sessions", removed);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lecture() -> StudyMaterial {
        StudyMaterial::Lecture {
            theory: "t".into(),
            notebook: "n".into(),
        }
    }

    #[test]
    fn test_save_then_get() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.save(lecture(), GenerationMetadata::default());
        assert_eq!(store.get(&id).unwrap().material, lecture());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_id_not_found() {
        let store = SessionStore::new(Duration::from_secs(60));
        let err = store.get(&SessionId::new()).unwrap_err();
        assert!(matches!(err, Lecture2CodeError::SessionNotFound { .. }));
    }

    #[test]
    fn test_expired_entry_is_gone() {
        let store = SessionStore::new(Duration::from_secs(10));
        let t0 = Instant::now();
        let id = store.save_at(lecture(), GenerationMetadata::default(), t0);

        assert!(store.get_at(&id, t0 + Duration::from_secs(9)).is_ok());
        let err = store.get_at(&id, t0 + Duration::from_secs(10)).unwrap_err();
        assert!(matches!(err, Lecture2CodeError::SessionNotFound { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_purges_expired() {
        let store = SessionStore::new(Duration::from_secs(10));
        let t0 = Instant::now();
        store.save_at(lecture(), GenerationMetadata::default(), t0);
        store.save_at(lecture(), GenerationMetadata::default(), t0 + Duration::from_secs(11));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ids_are_unique_uuids() {
        let store = SessionStore::new(Duration::from_secs(60));
        let a = store.save(lecture(), GenerationMetadata::default());
        let b = store.save(lecture(), GenerationMetadata::default());
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
        assert_eq!(a.to_string().parse::<SessionId>().unwrap(), a);
    }

    #[test]
    fn test_garbage_id_is_not_found() {
        let err = "not-a-uuid".parse::<SessionId>().unwrap_err();
        assert!(matches!(err, Lecture2CodeError::SessionNotFound { .. }));
    }
}
