//! SQLite-based session store
//!
//! Survives restarts and can be shared by several server processes pointing
//! at the same file.

use crate::error::{Result, StoreError};
use crate::session::{SessionStore, DEFAULT_SESSION_TTL};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Session store
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    ttl: Duration,
}

#[allow(clippy::result_large_err)]
impl SqliteSessionStore {
    /// Open the session database (create if not exists)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_ttl(path, DEFAULT_SESSION_TTL)
    }

    pub fn open_with_ttl(path: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self {
            conn: Mutex::new(conn),
            ttl,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Initialize tables
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS session_data (
                session_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (session_id, key)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_session_created ON session_data(created_at)",
            [],
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Rows created at or before this instant are expired
    fn cutoff(&self) -> i64 {
        now_secs() - self.ttl.as_secs() as i64
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                r#"
                SELECT value FROM session_data
                WHERE session_id = ?1 AND key = ?2 AND created_at > ?3
                "#,
                params![session_id, key, self.cutoff()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        let cutoff = self.cutoff();

        // An expired session is replaced rather than extended
        conn.execute(
            "DELETE FROM session_data WHERE session_id = ?1 AND created_at <= ?2",
            params![session_id, cutoff],
        )?;

        // All keys of a session share the creation time of its first write
        conn.execute(
            r#"
            INSERT INTO session_data (session_id, key, value, created_at)
            VALUES (?1, ?2, ?3, COALESCE(
                (SELECT MIN(created_at) FROM session_data WHERE session_id = ?1),
                ?4
            ))
            ON CONFLICT(session_id, key) DO UPDATE SET value = excluded.value
            "#,
            params![session_id, key, value, now_secs()],
        )?;

        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM session_data WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    fn purge_expired(&self) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM session_data WHERE created_at <= ?1",
            params![self.cutoff()],
        )?;
        if removed > 0 {
            tracing::debug!(rows = removed, "Purged expired session rows");
        }
        Ok(removed)
    }
}
