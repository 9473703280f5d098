//! Outbound HTTP client for the SMART authorization server and FHIR API
//!
//! Calls are made strictly one after another; there is no retry. Every
//! request is bounded by the configured timeout.

use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use smartlaunch_core::{
    smart::discovery_url, ClinicalBundles, LaunchError, PatientGrant, Result,
    SmartConfiguration, SmartEndpoints, TokenResponse,
};
use std::time::Duration;

use crate::config::SmartSettings;

const FHIR_JSON: &str = "application/fhir+json";

/// HTTP client shared by all handlers (pooled connections)
#[derive(Clone)]
pub struct SmartClient {
    http: reqwest::Client,
}

impl SmartClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("smartlaunch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// GET `{iss}/.well-known/smart-configuration` and pull out the endpoints.
    pub async fn discover(&self, iss: &str) -> Result<SmartEndpoints> {
        let url = discovery_url(iss);

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| LaunchError::Discovery(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| LaunchError::Discovery(e.to_string()))?;

        let config = SmartConfiguration::from_json(&body)?;
        tracing::debug!(
            url = %url,
            capabilities = config.capability_count(),
            "Fetched SMART configuration"
        );
        config.endpoints()
    }

    /// POST the authorization code to the token endpoint.
    pub async fn exchange_code(
        &self,
        token_endpoint: &str,
        code: &str,
        smart: &SmartSettings,
    ) -> Result<PatientGrant> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", smart.redirect_uri.as_str()),
            ("client_id", smart.client_id.as_str()),
        ];

        let response = self
            .http
            .post(token_endpoint)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| LaunchError::TokenExchange(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LaunchError::TokenExchange(e.to_string()))?;

        tracing::debug!(url = %token_endpoint, status = %status, "Token endpoint responded");

        TokenResponse::from_json(&body)?
            .into_grant()
            .map_err(|e| match e {
                LaunchError::TokenExchange(detail) => {
                    LaunchError::TokenExchange(format!("{} (HTTP {})", detail, status))
                }
                other => other,
            })
    }

    /// Authenticated FHIR GET returning the JSON body
    async fn fhir_get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        resource: &str,
        grant: &PatientGrant,
    ) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .query(query)
            .header(AUTHORIZATION, format!("Bearer {}", grant.access_token))
            .header(ACCEPT, FHIR_JSON)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| LaunchError::fhir(resource, e))?;

        tracing::debug!(url = %url, status = %response.status(), "FHIR read");

        response
            .json::<Value>()
            .await
            .map_err(|e| LaunchError::fhir(resource, e))
    }

    /// GET `{iss}/Patient/{id}`
    pub async fn read_patient(&self, iss: &str, grant: &PatientGrant) -> Result<Value> {
        let url = format!(
            "{}/Patient/{}",
            fhir_base(iss),
            urlencoding::encode(&grant.patient_id)
        );
        self.fhir_get(&url, &[], "Patient", grant).await
    }

    /// GET `{iss}/{resource_type}?patient={id}`
    pub async fn search_by_patient(
        &self,
        iss: &str,
        resource_type: &str,
        grant: &PatientGrant,
    ) -> Result<Value> {
        let url = format!("{}/{}", fhir_base(iss), resource_type);
        self.fhir_get(&url, &[("patient", grant.patient_id.as_str())], resource_type, grant)
            .await
    }

    /// Patient, Condition, MedicationRequest and Observation, in that order.
    pub async fn fetch_clinical(&self, iss: &str, grant: &PatientGrant) -> Result<ClinicalBundles> {
        let patient = self.read_patient(iss, grant).await?;
        let conditions = self.search_by_patient(iss, "Condition", grant).await?;
        let medications = self.search_by_patient(iss, "MedicationRequest", grant).await?;
        let observations = self.search_by_patient(iss, "Observation", grant).await?;

        Ok(ClinicalBundles {
            patient,
            conditions,
            medications,
            observations,
        })
    }
}

fn fhir_base(iss: &str) -> &str {
    iss.trim_end_matches('/')
}
