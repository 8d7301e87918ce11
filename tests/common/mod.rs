// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use habitmate::config::Config;
use habitmate::db::Store;
use habitmate::routes::create_router;
use habitmate::services::{AuthService, Mailer, OAuthClient};
use habitmate::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test store connected to the emulator.
#[allow(dead_code)]
pub async fn test_store() -> Store {
    Store::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock store (offline).
#[allow(dead_code)]
pub fn test_store_offline() -> Store {
    Store::new_mock()
}

fn build_app(config: Config, store: Store) -> (axum::Router, Arc<AppState>) {
    let auth = AuthService::new(store.clone(), &config);

    let state = Arc::new(AppState {
        config,
        store,
        auth,
        oauth: OAuthClient::new(),
        mailer: Mailer::disabled(),
        image_host: None,
        assistant: None,
    });

    (create_router(state.clone()), state)
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    build_app(Config::test_default(), test_store_offline())
}

/// Create a test app backed by the Firestore emulator.
#[allow(dead_code)]
pub async fn create_emulator_app() -> (axum::Router, Arc<AppState>) {
    build_app(Config::test_default(), test_store().await)
}

/// Collect the response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&bytes).expect("Response body was not valid JSON")
}

/// All Set-Cookie header values on a response.
#[allow(dead_code)]
pub fn set_cookie_headers(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Find a named cookie among Set-Cookie headers.
#[allow(dead_code)]
pub fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

/// The value part of a `name=value; attrs...` Set-Cookie header.
#[allow(dead_code)]
pub fn cookie_value(cookie_header: &str) -> String {
    cookie_header
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}

/// Build a JSON request.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

/// Register a fresh user through the API and log in.
/// Returns (access token, refresh token, email).
#[allow(dead_code)]
pub async fn register_and_login(app: &axum::Router) -> (String, String, String) {
    use axum::http::StatusCode;
    use tower::ServiceExt;

    let tag = uuid::Uuid::new_v4().simple().to_string();
    let email = format!("user_{tag}@example.com");
    let username = format!("user_{tag}");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v2/users/register",
            &serde_json::json!({
                "email": email,
                "username": username,
                "password": "hunter2hunter2",
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v2/users/login",
            &serde_json::json!({
                "email": email,
                "password": "hunter2hunter2",
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    (
        body["accessToken"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
        email,
    )
}
