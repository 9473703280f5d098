use axum::{
    extract::State,
    response::{Html, IntoResponse, Json},
};
use serde_json::json;
use std::sync::Arc;

use crate::{view, AppState};

/// Landing page with registration details (GET /)
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(view::index_page(&state.config))
}

/// Health check (GET /health)
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
