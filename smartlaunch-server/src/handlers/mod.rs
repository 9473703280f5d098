pub mod callback;
pub mod index;
pub mod launch;

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use smartlaunch_core::LaunchError;

use crate::view;

/// A [`LaunchError`] rendered as an inline HTML error page
#[derive(Debug)]
pub struct ErrorPage(pub LaunchError);

impl From<LaunchError> for ErrorPage {
    fn from(error: LaunchError) -> Self {
        ErrorPage(error)
    }
}

impl ErrorPage {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            LaunchError::MissingLaunchParameters | LaunchError::MissingCode => {
                StatusCode::BAD_REQUEST
            }
            LaunchError::SessionExpired | LaunchError::StateMismatch => StatusCode::UNAUTHORIZED,
            LaunchError::Discovery(_)
            | LaunchError::TokenExchange(_)
            | LaunchError::FhirRequest { .. } => StatusCode::BAD_GATEWAY,
            LaunchError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = %status, error = %self.0, "Launch flow aborted");
        (
            status,
            [(header::CACHE_CONTROL, "no-store")],
            Html(view::error_fragment(&self.0)),
        )
            .into_response()
    }
}

/// Treat an empty query value like a missing one
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
