//! smartlaunch - SMART-on-FHIR EHR launch client
//!
//! Receives an EHR launch, completes the OAuth2 authorization-code flow and
//! renders the launched patient's clinical summary.

pub mod client;
pub mod config;
pub mod handlers;
pub mod session;
pub mod view;

use axum::{
    http::{HeaderMap, Method},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use smartlaunch_store::{MemorySessionStore, SessionStore, SqliteSessionStore};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use client::SmartClient;
use config::{ServerConfig, SessionBackend};

/// Application state
pub struct AppState {
    pub config: ServerConfig,
    pub sessions: Arc<dyn SessionStore>,
    pub client: SmartClient,
    pub cookie_key: Key,
}

impl AppState {
    /// Build state from configuration: session backend, cookie key and HTTP client.
    pub fn from_config(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let ttl = config.session_ttl();
        let sessions: Arc<dyn SessionStore> = match config.session.backend {
            SessionBackend::Memory => Arc::new(MemorySessionStore::with_ttl(ttl)),
            SessionBackend::Sqlite => {
                if let Some(parent) = config.session.sqlite_path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent)?;
                }
                Arc::new(SqliteSessionStore::open_with_ttl(
                    &config.session.sqlite_path,
                    ttl,
                )?)
            }
        };

        let secret = match config.session.secret.as_deref() {
            Some(secret) => secret.to_string(),
            None => {
                tracing::warn!(
                    "No session secret configured (SMARTLAUNCH_SESSION_SECRET); \
                     using an ephemeral one, sessions will not survive a restart"
                );
                session::generate_secret()
            }
        };

        let client = SmartClient::new(config.http_timeout())?;

        Ok(Self {
            cookie_key: session::cookie_key(&secret),
            config,
            sessions,
            client,
        })
    }

    /// Mark the session cookie `Secure` when served over HTTPS
    pub fn secure_cookies(&self) -> bool {
        self.config.server.public_url.starts_with("https://")
    }

    /// Signed cookie jar for the incoming request
    pub fn cookie_jar(&self, headers: &HeaderMap) -> SignedCookieJar {
        SignedCookieJar::from_headers(headers, self.cookie_key.clone())
    }
}

/// Build the application router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index::index))
        .route("/health", get(handlers::index::health_check))
        // SMART EHR launch flow
        .route("/launch", get(handlers::launch::launch))
        .route("/callback", get(handlers::callback::callback))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Periodically drop expired sessions so the store does not grow unbounded.
pub fn spawn_session_reaper(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let period = state.config.session_ttl().max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            match state.sessions.purge_expired() {
                Ok(0) => {}
                Ok(n) => tracing::debug!(sessions = n, "Purged expired sessions"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge sessions"),
            }
        }
    })
}
