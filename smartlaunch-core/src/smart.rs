//! SMART App Launch wire types
//!
//! Discovery document (`.well-known/smart-configuration`), token response and
//! the authorization request redirect.
//! See: https://hl7.org/fhir/smart-app-launch/

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LaunchError, Result};

/// Path of the discovery document relative to the FHIR base (`iss`).
pub const SMART_CONFIGURATION_PATH: &str = ".well-known/smart-configuration";

/// Build the discovery URL for an issuer, tolerating a trailing slash.
pub fn discovery_url(iss: &str) -> String {
    format!("{}/{}", iss.trim_end_matches('/'), SMART_CONFIGURATION_PATH)
}

/// SMART configuration published by the authorization server.
///
/// Only the two endpoints are needed. Other members are kept untyped so a
/// server publishing them in an unexpected shape is still usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,
}

/// Endpoints extracted from a valid discovery document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

impl SmartConfiguration {
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| LaunchError::Discovery(e.to_string()))
    }

    /// Number of advertised capabilities; 0 unless `capabilities` is an array.
    pub fn capability_count(&self) -> usize {
        self.capabilities
            .as_ref()
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// Both endpoints must be present and non-empty.
    pub fn endpoints(&self) -> Result<SmartEndpoints> {
        let authorization_endpoint = non_empty(&self.authorization_endpoint)
            .ok_or_else(|| LaunchError::Discovery("'authorization_endpoint'".to_string()))?;
        let token_endpoint = non_empty(&self.token_endpoint)
            .ok_or_else(|| LaunchError::Discovery("'token_endpoint'".to_string()))?;

        Ok(SmartEndpoints {
            authorization_endpoint: authorization_endpoint.to_string(),
            token_endpoint: token_endpoint.to_string(),
        })
    }
}

/// OAuth2 token endpoint response with SMART launch context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<Value>,

    /// Seconds as a number, though some servers send a string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<Value>,

    /// SMART launch context: in-context patient id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<String>,
}

/// Access token bound to the launch patient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientGrant {
    pub access_token: String,
    pub patient_id: String,
}

impl TokenResponse {
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| LaunchError::TokenExchange(e.to_string()))
    }

    pub fn into_grant(self) -> Result<PatientGrant> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LaunchError::TokenExchange("missing access_token".to_string()))?;
        let patient_id = self
            .patient
            .filter(|p| !p.is_empty())
            .ok_or_else(|| LaunchError::TokenExchange("missing patient".to_string()))?;

        Ok(PatientGrant {
            access_token,
            patient_id,
        })
    }
}

/// Authorization request sent to the EHR's authorization endpoint
#[derive(Debug, Clone)]
pub struct AuthorizeRequest<'a> {
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scope: &'a str,
    pub aud: &'a str,
    pub launch: &'a str,
    pub state: &'a str,
}

impl AuthorizeRequest<'_> {
    /// Query parameters in the order they are sent
    pub fn params(&self) -> [(&'static str, &str); 7] {
        [
            ("response_type", "code"),
            ("client_id", self.client_id),
            ("redirect_uri", self.redirect_uri),
            ("scope", self.scope),
            ("aud", self.aud),
            ("launch", self.launch),
            ("state", self.state),
        ]
    }

    /// Append the percent-encoded parameters to the authorization endpoint.
    pub fn to_url(&self, authorization_endpoint: &str) -> String {
        let query = self
            .params()
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let separator = if authorization_endpoint.contains('?') {
            '&'
        } else {
            '?'
        };
        format!("{}{}{}", authorization_endpoint, separator, query)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
