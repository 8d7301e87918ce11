// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google and GitHub OAuth login routes.
//!
//! The `state` parameter carries the frontend URL to return to, signed
//! with HMAC-SHA256 so the callback cannot be used as an open redirect.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{Config, OAuthProviderConfig, SESSION_TTL_DAYS};
use crate::error::{AppError, Result};
use crate::models::{AuthProvider, Session};
use crate::routes::users::{access_cookie, refresh_cookie, session_cookie};
use crate::services::{ProviderProfile, TokenPair};
use crate::AppState;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_SCOPE: &str = "openid email profile";
const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_SCOPE: &str = "read:user user:email";

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/auth/google", get(google_start))
        .route("/users/auth/github", get(github_start))
        .route("/users/google/callback", get(google_callback))
        .route("/users/github/callback", get(github_callback))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses the configured frontend URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn google_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let creds = google_creds(&state.config)?;
    let oauth_state = make_signed_state(
        &frontend_target(&state.config, params.redirect_uri),
        &state.config.oauth_state_key,
    )?;
    let callback = callback_url(&state.config, AuthProvider::Google);

    let auth_url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
        GOOGLE_AUTH_URL,
        creds.client_id,
        urlencoding::encode(&callback),
        urlencoding::encode(GOOGLE_SCOPE),
        oauth_state
    );

    tracing::info!(provider = "google", "Starting OAuth flow");
    Ok(Redirect::temporary(&auth_url))
}

async fn github_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let creds = github_creds(&state.config)?;
    let oauth_state = make_signed_state(
        &frontend_target(&state.config, params.redirect_uri),
        &state.config.oauth_state_key,
    )?;
    let callback = callback_url(&state.config, AuthProvider::Github);

    let auth_url = format!(
        "{}?client_id={}&redirect_uri={}&scope={}&state={}",
        GITHUB_AUTH_URL,
        creds.client_id,
        urlencoding::encode(&callback),
        urlencoding::encode(GITHUB_SCOPE),
        oauth_state
    );

    tracing::info!(provider = "github", "Starting OAuth flow");
    Ok(Redirect::temporary(&auth_url))
}

async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let frontend_url = callback_frontend(&state.config, params.state.as_deref());

    let outcome = async {
        check_provider_error(params.error)?;
        let code = params
            .code
            .as_deref()
            .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;
        let creds = google_creds(&state.config)?;
        let profile = state
            .oauth
            .exchange_google(code, &callback_url(&state.config, AuthProvider::Google), creds)
            .await?;
        finish_login(&state, AuthProvider::Google, &profile).await
    }
    .await;

    Ok(callback_response(&state, jar, &frontend_url, "google", outcome))
}

async fn github_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let frontend_url = callback_frontend(&state.config, params.state.as_deref());

    let outcome = async {
        check_provider_error(params.error)?;
        let code = params
            .code
            .as_deref()
            .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;
        let creds = github_creds(&state.config)?;
        let profile = state
            .oauth
            .exchange_github(code, &callback_url(&state.config, AuthProvider::Github), creds)
            .await?;
        finish_login(&state, AuthProvider::Github, &profile).await
    }
    .await;

    Ok(callback_response(&state, jar, &frontend_url, "github", outcome))
}

/// Log the profile in, establish a server-side session and hand back
/// everything the callback needs to set cookies.
async fn finish_login(
    state: &Arc<AppState>,
    provider: AuthProvider,
    profile: &ProviderProfile,
) -> Result<(TokenPair, Session)> {
    let (user, pair) = state.auth.oauth_login(provider, profile).await?;
    let session = Session::new(user.id.clone(), SESSION_TTL_DAYS, Utc::now());
    state.store.upsert_session(&session).await?;
    Ok((pair, session))
}

/// A successful login redirects to the dashboard with the cookie trio
/// set; any failure redirects to the frontend with an error marker
/// instead of surfacing a JSON error to the browser.
fn callback_response(
    state: &Arc<AppState>,
    jar: CookieJar,
    frontend_url: &str,
    provider: &str,
    outcome: Result<(TokenPair, Session)>,
) -> Response {
    match outcome {
        Ok((pair, session)) => {
            let jar = jar
                .add(access_cookie(&state.config, pair.access_token))
                .add(refresh_cookie(&state.config, pair.refresh_token))
                .add(session_cookie(&state.config, session.id));
            let destination = format!("{}/dashboard", frontend_url);
            (jar, Redirect::temporary(&destination)).into_response()
        }
        Err(e) => {
            tracing::warn!(provider, error = %e, "OAuth callback failed");
            let destination = format!("{}/?error=oauth_failed", frontend_url);
            Redirect::temporary(&destination).into_response()
        }
    }
}

fn check_provider_error(error: Option<String>) -> Result<()> {
    if let Some(error) = error {
        return Err(AppError::Unauthorized(format!(
            "Provider returned error: {}",
            error
        )));
    }
    Ok(())
}

fn google_creds(config: &Config) -> Result<&OAuthProviderConfig> {
    config
        .google_oauth
        .as_ref()
        .ok_or_else(|| AppError::Validation("Google OAuth is not configured".to_string()))
}

fn github_creds(config: &Config) -> Result<&OAuthProviderConfig> {
    config
        .github_oauth
        .as_ref()
        .ok_or_else(|| AppError::Validation("GitHub OAuth is not configured".to_string()))
}

fn frontend_target(config: &Config, redirect_uri: Option<String>) -> String {
    redirect_uri.unwrap_or_else(|| config.frontend_url.clone())
}

/// Decode and verify the frontend URL from the state parameter, falling
/// back to the configured frontend when it is absent or tampered with.
fn callback_frontend(config: &Config, state: Option<&str>) -> String {
    state
        .and_then(|s| verify_and_decode_state(s, &config.oauth_state_key))
        .unwrap_or_else(|| {
            tracing::warn!("Invalid or missing OAuth state, falling back to default frontend URL");
            config.frontend_url.clone()
        })
}

fn callback_url(config: &Config, provider: AuthProvider) -> String {
    format!(
        "{}/api/v2/users/{}/callback",
        config.backend_url,
        provider.as_str()
    )
}

/// Sign "frontend_url|timestamp_hex" and base64-encode the result for
/// use as the OAuth state parameter.
fn make_signed_state(frontend_url: &str, secret: &[u8]) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let state_payload = format!("{}|{:x}", frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    // Combine payload + signature: "payload|signature_hex"
    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));

    Ok(URL_SAFE_NO_PAD.encode(signed_state.as_bytes()))
}

/// Verify HMAC signature and decode the frontend URL from the OAuth state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "frontend_url|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let frontend_url = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    // Reconstruct payload and verify signature
    let payload = format!("{}|{}", frontend_url, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(frontend_url.to_string())
}
