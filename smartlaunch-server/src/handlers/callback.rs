use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use smartlaunch_core::{Dashboard, LaunchError};
use std::sync::Arc;

use super::{present, ErrorPage};
use crate::session::{self, BrowserSession};
use crate::{view, AppState};

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Values stored by `/launch`
struct PendingLaunch {
    token_endpoint: String,
    iss: String,
    state: String,
}

/// Read and consume the pending launch. Any missing key means the session
/// expired or `/launch` never ran in this browser.
fn take_pending(browser: &BrowserSession<'_>) -> Result<PendingLaunch, LaunchError> {
    let token_endpoint = browser.get(session::TOKEN_ENDPOINT)?;
    let iss = browser.get(session::ISS)?;
    let state = browser.get(session::STATE)?;
    browser.clear()?;

    match (token_endpoint, iss, state) {
        (Some(token_endpoint), Some(iss), Some(state)) => Ok(PendingLaunch {
            token_endpoint,
            iss,
            state,
        }),
        _ => Err(LaunchError::SessionExpired),
    }
}

/// OAuth redirect target (GET /callback?code=...&state=...)
///
/// Exchanges the code, pulls the patient's summary from the FHIR server and
/// renders the dashboard.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ErrorPage> {
    let Some(code) = present(params.code) else {
        return Err(LaunchError::MissingCode.into());
    };

    let browser = BrowserSession::from_jar(state.sessions.as_ref(), &state.cookie_jar(&headers))
        .ok_or(LaunchError::SessionExpired)?;
    let pending = take_pending(&browser)?;

    if present(params.state).as_deref() != Some(pending.state.as_str()) {
        return Err(LaunchError::StateMismatch.into());
    }

    let grant = state
        .client
        .exchange_code(&pending.token_endpoint, &code, &state.config.smart)
        .await?;

    tracing::info!(
        iss = %pending.iss,
        patient = %grant.patient_id,
        "Token exchange succeeded"
    );

    let bundles = state.client.fetch_clinical(&pending.iss, &grant).await?;
    let dashboard = Dashboard::from_bundles(grant.patient_id.clone(), &bundles);

    tracing::info!(
        patient = %grant.patient_id,
        conditions = dashboard.conditions.len(),
        medications = dashboard.medications.len(),
        observations = dashboard.observations.len(),
        "Rendering dashboard"
    );

    Ok(Html(view::dashboard_page(&dashboard)).into_response())
}
