//! In-process session store

use crate::error::{Result, StoreError};
use crate::session::{SessionStore, DEFAULT_SESSION_TTL};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct SessionRecord {
    created_at: Instant,
    values: HashMap<String, String>,
}

/// Session store backed by a `HashMap`. Lost on restart.
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live (unexpired) sessions
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .map(|s| s.values().filter(|r| !self.is_expired(r)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, record: &SessionRecord) -> bool {
        record.created_at.elapsed() >= self.ttl
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        let sessions = self.sessions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(sessions
            .get(session_id)
            .filter(|record| !self.is_expired(record))
            .and_then(|record| record.values.get(key).cloned()))
    }

    fn set(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::Poisoned)?;

        // An expired record is replaced rather than extended
        if sessions
            .get(session_id)
            .is_some_and(|record| self.is_expired(record))
        {
            sessions.remove(session_id);
        }

        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionRecord {
                created_at: Instant::now(),
                values: HashMap::new(),
            })
            .values
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::Poisoned)?;
        sessions.remove(session_id);
        Ok(())
    }

    fn purge_expired(&self) -> Result<usize> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::Poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, record| !self.is_expired(record));
        Ok(before - sessions.len())
    }
}
