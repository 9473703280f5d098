use thiserror::Error;

/// Everything that can abort a launch or callback request.
///
/// Each variant is terminal for the request: the flow stops and the user sees
/// the variant's [`LaunchError::user_message`].
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Missing SMART launch parameters")]
    MissingLaunchParameters,

    #[error("SMART discovery failed: {0}")]
    Discovery(String),

    #[error("No authorization code in callback")]
    MissingCode,

    #[error("Session expired or missing launch state")]
    SessionExpired,

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("FHIR request for {resource} failed: {detail}")]
    FhirRequest { resource: String, detail: String },

    #[error("Session storage error: {0}")]
    Session(String),
}

impl LaunchError {
    pub fn fhir(resource: impl Into<String>, detail: impl ToString) -> Self {
        LaunchError::FhirRequest {
            resource: resource.into(),
            detail: detail.to_string(),
        }
    }

    /// Short text shown to the browser. Upstream details are only exposed for
    /// discovery failures; everything else stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            LaunchError::MissingLaunchParameters => {
                "Error: Missing SMART launch parameters.".to_string()
            }
            LaunchError::Discovery(detail) => {
                format!("Failed to discover SMART config: {}", detail)
            }
            LaunchError::MissingCode => "No code returned from authorization step.".to_string(),
            LaunchError::SessionExpired => "Session expired or invalid SMART launch.".to_string(),
            LaunchError::StateMismatch => "State mismatch: possible forged callback.".to_string(),
            LaunchError::TokenExchange(_) => "Token exchange failed.".to_string(),
            LaunchError::FhirRequest { resource, .. } => {
                format!("Failed to fetch {} from FHIR server.", resource)
            }
            LaunchError::Session(_) => "Session storage unavailable.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;
