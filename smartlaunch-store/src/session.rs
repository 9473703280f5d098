//! Session store abstraction
//!
//! A session is a small string map keyed by an opaque session id (the value
//! carried in the browser cookie). Sessions expire a fixed TTL after their
//! first write; expired sessions read as absent.

use crate::error::Result;
use std::time::Duration;

/// Default session lifetime: 10 minutes, enough for one launch round-trip
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(10 * 60);

pub trait SessionStore: Send + Sync {
    /// Read one value. `None` for unknown or expired sessions.
    fn get(&self, session_id: &str, key: &str) -> Result<Option<String>>;

    /// Write one value, creating the session if needed.
    fn set(&self, session_id: &str, key: &str, value: &str) -> Result<()>;

    /// Drop a session and all its values.
    fn remove(&self, session_id: &str) -> Result<()>;

    /// Delete expired sessions, returning how many were removed.
    fn purge_expired(&self) -> Result<usize>;
}
