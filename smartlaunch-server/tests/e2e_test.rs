//! End-to-end integration test
//!
//! Drives the full EHR launch against a mock EHR (authorization server + FHIR
//! API): GET /launch -> 302 authorize -> GET /callback -> dashboard

use reqwest::{header, redirect::Policy, StatusCode, Url};
use serde_json::json;
use smartlaunch_server::{build_router, config::ServerConfig, AppState};
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header as header_eq, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.session.secret = Some("integration-test-secret".to_string());
    config.http.timeout_secs = 5;
    config
}

/// Start the app on a random port, returns its base URL
async fn start_test_server() -> String {
    start_test_server_with(test_config()).await
}

async fn start_test_server_with(config: ServerConfig) -> String {
    let state = Arc::new(AppState::from_config(config).unwrap());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap()
}

/// Mock EHR publishing a discovery document; returns (server, iss)
async fn start_mock_ehr() -> (MockServer, String) {
    let ehr = MockServer::start().await;
    let iss = format!("{}/fhir", ehr.uri());

    Mock::given(method("GET"))
        .and(path("/fhir/.well-known/smart-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authorization_endpoint": format!("{}/auth/authorize", ehr.uri()),
            "token_endpoint": format!("{}/auth/token", ehr.uri()),
            "capabilities": ["launch-ehr", "client-public"]
        })))
        .mount(&ehr)
        .await;

    (ehr, iss)
}

async fn mount_fhir_data(ehr: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/fhir/Patient/123"))
        .and(header_eq("Authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Patient",
            "id": "123",
            "name": [{"family": "Doe", "given": ["Jane"]}]
        })))
        .expect(1)
        .mount(ehr)
        .await;

    Mock::given(method("GET"))
        .and(path("/fhir/Condition"))
        .and(query_param("patient", "123"))
        .and(header_eq("Authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                {"resource": {"resourceType": "Condition", "code": {"text": "Asthma"}}},
                {"resource": {"resourceType": "Condition", "code": {"text": "Anemia"}}}
            ]
        })))
        .mount(ehr)
        .await;

    Mock::given(method("GET"))
        .and(path("/fhir/MedicationRequest"))
        .and(query_param("patient", "123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "total": 0
        })))
        .mount(ehr)
        .await;

    Mock::given(method("GET"))
        .and(path("/fhir/Observation"))
        .and(query_param("patient", "123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                {"resource": {
                    "resourceType": "Observation",
                    "code": {"text": "Heart rate"},
                    "valueQuantity": {"value": 72, "unit": "bpm"},
                    "effectiveDateTime": "2024-01-01T10:00:00Z"
                }},
                {"resource": {
                    "resourceType": "Observation",
                    "code": {"text": "Height"},
                    "valueQuantity": {"value": 180, "unit": "cm"}
                }}
            ]
        })))
        .mount(ehr)
        .await;
}

async fn mount_token(ehr: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=code-1"))
        .and(body_string_contains("client_id=my-smart-app"))
        .and(body_string_contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Fcallback",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(ehr)
        .await;
}

/// Launch and return (session cookie, authorize query params)
async fn launch(base_url: &str, iss: &str) -> (String, HashMap<String, String>) {
    launch_with_cookie(base_url, iss, None).await
}

/// Launch from a browser that may already hold a session cookie
async fn launch_with_cookie(
    base_url: &str,
    iss: &str,
    cookie: Option<&str>,
) -> (String, HashMap<String, String>) {
    let mut request = client()
        .get(format!("{}/launch", base_url))
        .query(&[("iss", iss), ("launch", "launch-token-1")]);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let resp = request.send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);

    let cookie = match resp.headers().get(header::SET_COOKIE) {
        Some(set_cookie) => set_cookie
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string(),
        None => cookie
            .expect("launch should set the session cookie")
            .to_string(),
    };

    let location = resp.headers()[header::LOCATION].to_str().unwrap();
    let params = Url::parse(location)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    (cookie, params)
}

async fn get_callback(base_url: &str, cookie: Option<&str>, query: &[(&str, &str)]) -> reqwest::Response {
    let mut request = client().get(format!("{}/callback", base_url)).query(query);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    request.send().await.unwrap()
}

#[tokio::test]
async fn test_health_and_index() {
    let base_url = start_test_server().await;

    let resp = client().get(format!("{}/health", base_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let resp = client().get(&base_url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("/launch"));
}

#[tokio::test]
async fn test_launch_missing_parameters() {
    let base_url = start_test_server().await;

    for query in [
        vec![],
        vec![("iss", "https://ehr.example.com/fhir")],
        vec![("launch", "xyz")],
        vec![("iss", ""), ("launch", "xyz")],
    ] {
        let resp = client()
            .get(format!("{}/launch", base_url))
            .query(&query)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(resp.headers().get(header::LOCATION).is_none());
        assert_eq!(
            resp.text().await.unwrap(),
            "<h2>🚫 Error: Missing SMART launch parameters.</h2>"
        );
    }
}

#[tokio::test]
async fn test_launch_redirects_to_authorize() {
    let base_url = start_test_server().await;
    let (ehr, iss) = start_mock_ehr().await;

    let (cookie, params) = launch(&base_url, &iss).await;
    assert!(cookie.starts_with("smartlaunch_session="));

    let mut keys: Vec<_> = params.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(
        keys,
        vec!["aud", "client_id", "launch", "redirect_uri", "response_type", "scope", "state"]
    );
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["client_id"], "my-smart-app");
    assert_eq!(params["redirect_uri"], "http://localhost:8000/callback");
    assert_eq!(params["scope"], "launch patient/*.read openid profile");
    assert_eq!(params["aud"], iss);
    assert_eq!(params["launch"], "launch-token-1");
    assert_eq!(params["state"].len(), 43);

    // Each launch gets its own state
    let (_, second) = launch(&base_url, &iss).await;
    assert_ne!(params["state"], second["state"]);

    drop(ehr);
}

#[tokio::test]
async fn test_launch_discovery_failure() {
    let base_url = start_test_server().await;
    let ehr = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/fhir/.well-known/smart-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_endpoint": "https://ehr.example.com/token"
        })))
        .mount(&ehr)
        .await;

    let resp = client()
        .get(format!("{}/launch", base_url))
        .query(&[("iss", format!("{}/fhir", ehr.uri()).as_str()), ("launch", "x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(resp.headers().get(header::LOCATION).is_none());
    assert!(resp
        .text()
        .await
        .unwrap()
        .starts_with("<h2>🚫 Failed to discover SMART config:"));

    // Unknown issuer: discovery document not found
    let resp = client()
        .get(format!("{}/launch", base_url))
        .query(&[("iss", format!("{}/other", ehr.uri()).as_str()), ("launch", "x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_callback_missing_code_and_session() {
    let base_url = start_test_server().await;

    let resp = get_callback(&base_url, None, &[("state", "s")]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.text().await.unwrap(),
        "<h2>🚫 No code returned from authorization step.</h2>"
    );

    let resp = get_callback(&base_url, None, &[("code", "code-1"), ("state", "s")]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.text().await.unwrap(),
        "<h2>🚫 Session expired or invalid SMART launch.</h2>"
    );

    // Unsigned cookie is ignored
    let resp = get_callback(
        &base_url,
        Some("smartlaunch_session=forged"),
        &[("code", "code-1"), ("state", "s")],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_full_launch_flow() {
    let base_url = start_test_server().await;
    let (ehr, iss) = start_mock_ehr().await;
    mount_token(&ehr, json!({"access_token": "abc", "patient": "123", "token_type": "Bearer"})).await;
    mount_fhir_data(&ehr).await;

    let (cookie, params) = launch(&base_url, &iss).await;

    let resp = get_callback(
        &base_url,
        Some(&cookie),
        &[("code", "code-1"), ("state", params["state"].as_str())],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let html = resp.text().await.unwrap();
    assert!(html.contains("<h1>Jane Doe</h1>"));
    assert!(html.contains("<li>Anemia</li>\n<li>Asthma</li>"));
    assert!(html.contains("No medications recorded"));
    assert!(html.contains("<tr><td>Heart rate</td><td>72 bpm</td></tr>"));
    assert!(html.contains(r#"[{"label":"Heart rate","num":72,"time":"2024-01-01T10:00:00Z"}]"#));
    assert!(!html.contains("Height"));

    // Launch state is single use
    let resp = get_callback(
        &base_url,
        Some(&cookie),
        &[("code", "code-1"), ("state", params["state"].as_str())],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    ehr.verify().await;
}

#[tokio::test]
async fn test_relaunch_after_abandoned_launch() {
    let mut config = test_config();
    config.session.ttl_secs = 2;
    let base_url = start_test_server_with(config).await;
    let (ehr, iss) = start_mock_ehr().await;
    mount_token(&ehr, json!({"access_token": "abc", "patient": "123"})).await;
    mount_fhir_data(&ehr).await;

    let (cookie, abandoned) = launch(&base_url, &iss).await;
    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let (cookie, params) = launch_with_cookie(&base_url, &iss, Some(&cookie)).await;
    assert_ne!(abandoned["state"], params["state"]);
    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    // The first launch is past its TTL, the second is not
    let resp = get_callback(
        &base_url,
        Some(&cookie),
        &[("code", "code-1"), ("state", params["state"].as_str())],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("<h1>Jane Doe</h1>"));
}

#[tokio::test]
async fn test_patient_id_is_path_encoded() {
    let base_url = start_test_server().await;
    let (ehr, iss) = start_mock_ehr().await;
    mount_token(&ehr, json!({"access_token": "abc", "patient": "a/b?c"})).await;

    Mock::given(method("GET"))
        .and(path("/fhir/Patient/a%2Fb%3Fc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Patient",
            "name": [{"family": "Roe", "given": ["Sam"]}]
        })))
        .expect(1)
        .mount(&ehr)
        .await;
    for resource in ["Condition", "MedicationRequest", "Observation"] {
        Mock::given(method("GET"))
            .and(path(format!("/fhir/{}", resource)))
            .and(query_param("patient", "a/b?c"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resourceType": "Bundle",
                "type": "searchset"
            })))
            .mount(&ehr)
            .await;
    }

    let (cookie, params) = launch(&base_url, &iss).await;
    let resp = get_callback(
        &base_url,
        Some(&cookie),
        &[("code", "code-1"), ("state", params["state"].as_str())],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("<h1>Sam Roe</h1>"));

    ehr.verify().await;
}

#[tokio::test]
async fn test_callback_state_mismatch() {
    let base_url = start_test_server().await;
    let (ehr, iss) = start_mock_ehr().await;

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "abc", "patient": "123"
        })))
        .expect(0)
        .mount(&ehr)
        .await;

    let (cookie, _) = launch(&base_url, &iss).await;

    let resp = get_callback(&base_url, Some(&cookie), &[("code", "code-1"), ("state", "123")]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.text().await.unwrap().contains("State mismatch"));

    ehr.verify().await;
}

#[tokio::test]
async fn test_callback_token_exchange_failure() {
    let base_url = start_test_server().await;
    let (ehr, iss) = start_mock_ehr().await;
    mount_token(&ehr, json!({"access_token": "abc"})).await;

    let (cookie, params) = launch(&base_url, &iss).await;

    let resp = get_callback(
        &base_url,
        Some(&cookie),
        &[("code", "code-1"), ("state", params["state"].as_str())],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(resp.text().await.unwrap(), "<h2>🚫 Token exchange failed.</h2>");
}

#[tokio::test]
async fn test_callback_fhir_failure_is_fatal() {
    let base_url = start_test_server().await;
    let (ehr, iss) = start_mock_ehr().await;
    mount_token(&ehr, json!({"access_token": "abc", "patient": "123"})).await;

    Mock::given(method("GET"))
        .and(path("/fhir/Patient/123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resourceType": "Patient"})))
        .mount(&ehr)
        .await;
    Mock::given(method("GET"))
        .and(path("/fhir/Condition"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&ehr)
        .await;

    let (cookie, params) = launch(&base_url, &iss).await;

    let resp = get_callback(
        &base_url,
        Some(&cookie),
        &[("code", "code-1"), ("state", params["state"].as_str())],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = resp.text().await.unwrap();
    assert_eq!(body, "<h2>🚫 Failed to fetch Condition from FHIR server.</h2>");
}
