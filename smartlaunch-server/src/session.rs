//! Browser session plumbing
//!
//! The browser carries a signed cookie holding a random session id; the values
//! live server-side in a [`SessionStore`]. Handlers only see the narrow
//! [`BrowserSession`] get/set interface.

use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha512};
use smartlaunch_core::{LaunchError, Result};
use smartlaunch_store::{SessionStore, StoreError};

pub const SESSION_COOKIE: &str = "smartlaunch_session";

/// Keys written by `/launch` and consumed by `/callback`
pub const TOKEN_ENDPOINT: &str = "token_endpoint";
pub const ISS: &str = "iss";
pub const STATE: &str = "state";

/// Handle on one browser's session
pub struct BrowserSession<'a> {
    store: &'a dyn SessionStore,
    id: String,
}

impl<'a> BrowserSession<'a> {
    pub fn new(store: &'a dyn SessionStore, id: impl Into<String>) -> Self {
        Self {
            store,
            id: id.into(),
        }
    }

    /// Session named by the signed cookie, if the browser sent one
    pub fn from_jar(store: &'a dyn SessionStore, jar: &SignedCookieJar) -> Option<Self> {
        jar.get(SESSION_COOKIE)
            .map(|cookie| Self::new(store, cookie.value().to_string()))
    }

    /// Reuse the browser's session or start a new one, returning the jar
    /// that must be sent back with the response.
    pub fn open(
        store: &'a dyn SessionStore,
        jar: SignedCookieJar,
        secure: bool,
    ) -> (Self, SignedCookieJar) {
        if let Some(session) = Self::from_jar(store, &jar) {
            return (session, jar);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let jar = jar.add(session_cookie(&id, secure));
        (Self::new(store, id), jar)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(&self.id, key).map_err(store_error)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store.set(&self.id, key, value).map_err(store_error)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.id).map_err(store_error)
    }

    /// Record a new pending launch. Anything left by an earlier launch in
    /// this browser is dropped first, so the TTL counts from now.
    pub fn begin_launch(&self, token_endpoint: &str, iss: &str, state: &str) -> Result<()> {
        self.clear()?;
        self.set(TOKEN_ENDPOINT, token_endpoint)?;
        self.set(ISS, iss)?;
        self.set(STATE, state)
    }
}

fn store_error(e: StoreError) -> LaunchError {
    LaunchError::Session(e.to_string())
}

fn session_cookie(id: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Derive the 64-byte cookie signing key from an arbitrary-length secret.
pub fn cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// 32 random bytes as 64 hex characters
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Per-launch OAuth `state`: 32 random bytes, base64url without padding
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
