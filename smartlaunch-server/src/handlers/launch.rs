use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use smartlaunch_core::{AuthorizeRequest, LaunchError};
use std::sync::Arc;

use super::{present, ErrorPage};
use crate::session::{self, BrowserSession};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LaunchParams {
    pub iss: Option<String>,
    pub launch: Option<String>,
}

/// EHR launch (GET /launch?iss=...&launch=...)
///
/// Discovers the authorization server, remembers where to exchange the code,
/// and sends the browser on to authorize.
pub async fn launch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<LaunchParams>,
) -> Result<Response, ErrorPage> {
    let (Some(iss), Some(launch_token)) = (present(params.iss), present(params.launch)) else {
        return Err(LaunchError::MissingLaunchParameters.into());
    };

    let endpoints = state.client.discover(&iss).await?;

    let jar = state.cookie_jar(&headers);
    let (browser, jar) =
        BrowserSession::open(state.sessions.as_ref(), jar, state.secure_cookies());
    let oauth_state = session::generate_state();
    browser.begin_launch(&endpoints.token_endpoint, &iss, &oauth_state)?;

    let smart = &state.config.smart;
    let authorize_url = AuthorizeRequest {
        client_id: &smart.client_id,
        redirect_uri: &smart.redirect_uri,
        scope: &smart.scope,
        aud: &iss,
        launch: &launch_token,
        state: &oauth_state,
    }
    .to_url(&endpoints.authorization_endpoint);

    tracing::info!(
        iss = %iss,
        authorize = %endpoints.authorization_endpoint,
        "Redirecting to SMART authorization"
    );

    Ok((
        StatusCode::FOUND,
        jar,
        [(header::LOCATION, authorize_url)],
    )
        .into_response())
}
