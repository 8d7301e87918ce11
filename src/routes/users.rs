// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account endpoints: registration, login, token refresh, profile and
//! email verification.
//!
//! Token-bearing responses set the `accessToken`/`refreshToken` cookies
//! and return the same tokens in the body for clients that prefer the
//! Authorization header.

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::middleware::auth::{
    CurrentUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, SESSION_COOKIE,
};
use crate::models::UserView;
use crate::routes::MessageResponse;
use crate::AppState;

const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/refresh-token", post(refresh_token))
        .route("/users/verify-email", get(verify_email))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/logout", post(logout))
        .route("/users/me", get(me))
        .route("/users/current-user", get(me))
        .route("/users/profile", get(get_profile).put(update_profile))
        .route("/users/avatar", put(upload_avatar))
        .route("/users/change-password", put(change_password))
        .route("/users/send-verification-email", post(send_verification_email))
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    identifier: Option<String>,
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    user: UserView,
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokensResponse {
    access_token: String,
    refresh_token: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = body.email.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let username = body
        .username
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let password = body.password.as_deref().filter(|s| !s.trim().is_empty());

    let (Some(email), Some(username), Some(password)) = (email, username, password) else {
        return Err(AppError::Validation("All fields are required".to_string()));
    };

    let user = state.auth.register(email, username, password).await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Clients send the login name as `identifier`, `email` or `username`
    let identifier = [body.identifier, body.email, body.username]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("Username or email is required".to_string()))?;
    let password = body
        .password
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Password is required".to_string()))?;

    let (user, pair) = state.auth.login(&identifier, &password).await?;

    let jar = jar
        .add(access_cookie(&state.config, pair.access_token.clone()))
        .add(refresh_cookie(&state.config, pair.refresh_token.clone()));
    Ok((
        jar,
        Json(AuthResponse {
            user: UserView::from(&user),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let presented = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| body.and_then(|Json(body)| body.refresh_token))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Unauthorized request".to_string()))?;

    let (_user, pair) = state.auth.refresh(&presented).await?;

    let jar = jar
        .add(access_cookie(&state.config, pair.access_token.clone()))
        .add(refresh_cookie(&state.config, pair.refresh_token.clone()));
    Ok((
        jar,
        Json(TokensResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    state.auth.logout(&current.user.id).await?;
    if let Some(sid) = jar.get(SESSION_COOKIE) {
        state.store.delete_session(sid.value()).await?;
    }

    let jar = jar
        .remove(removal_cookie(ACCESS_TOKEN_COOKIE))
        .remove(removal_cookie(REFRESH_TOKEN_COOKIE))
        .remove(removal_cookie(SESSION_COOKIE));
    Ok((jar, Json(MessageResponse::ok("Logged out successfully"))))
}

async fn me(Extension(current): Extension<CurrentUser>) -> Json<UserView> {
    Json(UserView::from(&current.user))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    user: UserView,
    total_habits: u32,
    longest_streak: u32,
    completed_habits: u32,
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ProfileResponse>, AppError> {
    let habits = state.store.habits_for_owner(&current.user.id).await?;

    let total_habits = habits.len() as u32;
    let longest_streak = habits.iter().map(|habit| habit.streak).max().unwrap_or(0);
    let completed_habits = habits
        .iter()
        .map(|habit| {
            habit
                .history
                .iter()
                .filter(|entry| entry.completed)
                .count() as u32
        })
        .sum();

    Ok(Json(ProfileResponse {
        user: UserView::from(&current.user),
        total_habits,
        longest_streak,
        completed_habits,
    }))
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    username: Option<String>,
    bio: Option<String>,
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserView>, AppError> {
    // The extension carries a sanitized copy; writes need the full record
    let mut user = state
        .store
        .get_user(&current.user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if let Some(username) = body.username {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Err(AppError::Validation("Username cannot be empty".to_string()));
        }
        if user.username.as_deref() != Some(username.as_str()) {
            if state.store.find_user_by_username(&username).await?.is_some() {
                return Err(AppError::Conflict("Username is already taken".to_string()));
            }
            user.username = Some(username);
        }
    }
    if let Some(bio) = body.bio {
        user.bio = Some(bio);
    }

    user.updated_at = Utc::now();
    state.store.upsert_user(&user).await?;
    Ok(Json(UserView::from(&user)))
}

async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<UserView>, AppError> {
    let image_host = state
        .image_host
        .as_ref()
        .ok_or_else(|| AppError::Validation("Image uploads are not configured".to_string()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("avatar") {
            let filename = field.file_name().unwrap_or("avatar").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?;
            upload = Some((data.to_vec(), filename));
            break;
        }
    }
    let (data, filename) =
        upload.ok_or_else(|| AppError::Validation("Avatar file is required".to_string()))?;
    if data.is_empty() {
        return Err(AppError::Validation("Avatar file is required".to_string()));
    }

    let uploaded = image_host.upload(data, &filename).await?;

    let mut user = state
        .store
        .get_user(&current.user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    // Replace before delete so a failed cleanup never loses the new URL
    if let Some(old_id) = user.profile_picture_id.take() {
        if let Err(e) = image_host.destroy(&old_id).await {
            tracing::warn!(error = %e, public_id = %old_id, "Failed to delete previous avatar");
        }
    }
    user.profile_picture = Some(uploaded.url);
    user.profile_picture_id = Some(uploaded.public_id);
    user.updated_at = Utc::now();
    state.store.upsert_user(&user).await?;

    Ok(Json(UserView::from(&user)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: Option<String>,
    new_password: Option<String>,
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let current_password = body
        .current_password
        .as_deref()
        .filter(|p| !p.trim().is_empty());
    let new_password = body.new_password.as_deref().filter(|p| !p.trim().is_empty());
    let (Some(current_password), Some(new_password)) = (current_password, new_password) else {
        return Err(AppError::Validation(
            "Current and new password are required".to_string(),
        ));
    };

    state
        .auth
        .change_password(&current.user.id, current_password, new_password)
        .await?;
    Ok(Json(MessageResponse::ok("Password changed successfully")))
}

async fn send_verification_email(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut user = state
        .store
        .get_user(&current.user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.email_verified {
        return Err(AppError::Validation("Email is already verified".to_string()));
    }
    let email = user
        .email
        .clone()
        .ok_or_else(|| AppError::Validation("Account has no email address".to_string()))?;

    let token = hex::encode(rand::rng().random::<[u8; 32]>());
    user.email_verification_token = Some(token.clone());
    user.email_verification_expires =
        Some(Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS));
    user.updated_at = Utc::now();
    state.store.upsert_user(&user).await?;

    let link = format!(
        "{}/api/v2/users/verify-email?token={}",
        state.config.backend_url, token
    );
    state
        .mailer
        .send(&email, "Verify your HabitMate email", verification_body(&link))
        .await?;

    Ok(Json(MessageResponse::ok("Verification email sent")))
}

#[derive(Deserialize)]
struct VerifyEmailQuery {
    token: Option<String>,
}

async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Verification token is required".to_string()))?;

    let mut user = state
        .store
        .find_user_by_verification_token(&token)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized("Invalid or expired verification token".to_string())
        })?;

    let expires = user.email_verification_expires.ok_or_else(|| {
        AppError::Unauthorized("Invalid or expired verification token".to_string())
    })?;
    if expires < Utc::now() {
        return Err(AppError::Unauthorized(
            "Invalid or expired verification token".to_string(),
        ));
    }

    user.email_verified = true;
    user.email_verification_token = None;
    user.email_verification_expires = None;
    user.updated_at = Utc::now();
    state.store.upsert_user(&user).await?;

    Ok(Json(MessageResponse::ok("Email verified successfully")))
}

fn verification_body(link: &str) -> String {
    format!(
        "<p>Welcome to HabitMate!</p>\
         <p>Click <a href=\"{}\">here</a> to verify your email address. \
         The link expires in {} hours.</p>\
         <p>If you did not create an account, you can ignore this email.</p>",
        link, VERIFICATION_TOKEN_TTL_HOURS
    )
}

// Cookie builders shared with the OAuth callbacks.

fn base_cookie(
    config: &Config,
    name: &'static str,
    value: String,
    max_age: time::Duration,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .path("/")
        .secure(config.production)
        .same_site(if config.production {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .max_age(max_age)
        .build()
}

pub(crate) fn access_cookie(config: &Config, token: String) -> Cookie<'static> {
    base_cookie(
        config,
        ACCESS_TOKEN_COOKIE,
        token,
        time::Duration::minutes(config.access_token_ttl_minutes),
    )
}

pub(crate) fn refresh_cookie(config: &Config, token: String) -> Cookie<'static> {
    base_cookie(
        config,
        REFRESH_TOKEN_COOKIE,
        token,
        time::Duration::days(config.refresh_token_ttl_days),
    )
}

pub(crate) fn session_cookie(config: &Config, session_id: String) -> Cookie<'static> {
    base_cookie(
        config,
        SESSION_COOKIE,
        session_id,
        time::Duration::days(crate::config::SESSION_TTL_DAYS),
    )
}

pub(crate) fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_cookie_attributes_development() {
        let config = Config::test_default();
        let cookie = access_cookie(&config, "tok".to_string());
        assert_eq!(cookie.name(), ACCESS_TOKEN_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::minutes(config.access_token_ttl_minutes))
        );
    }

    #[test]
    fn test_cookie_attributes_production() {
        let mut config = Config::test_default();
        config.production = true;
        let cookie = refresh_cookie(&config, "tok".to_string());
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::days(config.refresh_token_ttl_days))
        );
    }

    #[test]
    fn test_session_cookie_ttl() {
        let config = Config::test_default();
        let cookie = session_cookie(&config, "sid123".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::days(crate::config::SESSION_TTL_DAYS))
        );
    }

    #[test]
    fn test_removal_cookie_keeps_path() {
        let cookie = removal_cookie(ACCESS_TOKEN_COOKIE);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.value(), "");
    }
}
