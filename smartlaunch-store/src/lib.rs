pub mod error;
pub mod memory_store;
pub mod session;
pub mod sqlite_session;

pub use error::{Result, StoreError};
pub use memory_store::MemorySessionStore;
pub use session::{SessionStore, DEFAULT_SESSION_TTL};
pub use sqlite_session::SqliteSessionStore;
