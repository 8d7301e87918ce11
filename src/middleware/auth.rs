// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request identity resolution.
//!
//! Two credential sources are accepted, tried in order: a server-side
//! session (`sid` cookie, created by the OAuth callback) and a stateless
//! access token (cookie or `Authorization: Bearer` header). Whichever
//! resolves first attaches the owning identity, minus secret fields, to
//! the request as a [`CurrentUser`] extension.

use crate::error::AppError;
use crate::models::User;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
/// Cookie carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
/// Cookie carrying the server-side session id.
pub const SESSION_COOKIE: &str = "sid";

/// Access token claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject (user id)
    pub sub: String,
    pub email: Option<String>,
    pub username: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Refresh token claims. Carries the subject plus a unique token id;
/// everything else is looked up against the stored single-slot token.
/// The `jti` guarantees rotation always mints a distinct token, even
/// when two tokens are issued within the same wall-clock second.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    /// Unique token id (UUID v4)
    pub jti: String,
    pub exp: usize,
    pub iat: usize,
}

/// Authenticated identity attached to the request, secrets cleared.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
}

/// Middleware that requires a resolvable identity.
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = resolve_identity(&state, &jar, request.headers()).await?;

    request.extensions_mut().insert(CurrentUser {
        user: user.sanitized(),
    });

    Ok(next.run(request).await)
}

/// Resolve an identity from the session cookie or an access token.
async fn resolve_identity(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<User, AppError> {
    // Session strategy first: a stale or unknown session id falls
    // through to the token strategy rather than failing the request.
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(session) = state.store.get_session(cookie.value()).await? {
            if !session.expired(chrono::Utc::now()) {
                if let Some(user) = state.store.get_user(&session.user_id).await? {
                    return Ok(user);
                }
            }
        }
    }

    // Token strategy: cookie first, then header
    let token = if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(AppError::Unauthorized("Unauthorized request".to_string())),
        }
    };

    let claims = decode_access_token(&token, &state.config.access_token_secret)
        .ok_or_else(|| AppError::Unauthorized("Invalid access token".to_string()))?;

    state
        .store
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid access token".to_string()))
}

/// Create an access token for a user.
pub fn create_access_token(
    user: &User,
    signing_key: &[u8],
    ttl_minutes: i64,
) -> anyhow::Result<String> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = AccessClaims {
        sub: user.id.clone(),
        email: user.email.clone(),
        username: user.username.clone(),
        iat: now,
        exp: now + (ttl_minutes * 60) as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Create a refresh token for a user id.
pub fn create_refresh_token(
    user_id: &str,
    signing_key: &[u8],
    ttl_days: i64,
) -> anyhow::Result<String> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = RefreshClaims {
        sub: user_id.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now,
        exp: now + (ttl_days * 24 * 60 * 60) as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Decode and validate an access token. `None` when invalid or expired.
pub fn decode_access_token(token: &str, signing_key: &[u8]) -> Option<AccessClaims> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    decode::<AccessClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Decode and validate a refresh token. `None` when invalid or expired.
pub fn decode_refresh_token(token: &str, signing_key: &[u8]) -> Option<RefreshClaims> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    decode::<RefreshClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}
