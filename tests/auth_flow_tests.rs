// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Full authentication flows against the Firestore emulator.
//!
//! Run with FIRESTORE_EMULATOR_HOST set; each test registers its own
//! throwaway user so tests stay independent.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use habitmate::models::AuthProvider;
use habitmate::services::ProviderProfile;
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_register_rejects_duplicates() {
    require_emulator!();
    let (app, _) = common::create_emulator_app().await;

    let tag = uuid::Uuid::new_v4().simple().to_string();
    let payload = serde_json::json!({
        "email": format!("dup_{tag}@example.com"),
        "username": format!("dup_{tag}"),
        "password": "hunter2hunter2",
    })
    .to_string();

    let response = app
        .clone()
        .oneshot(common::json_request("POST", "/api/v2/users/register", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = common::body_json(response).await;
    assert_eq!(body["emailVerified"], false);
    assert!(body.get("passwordHash").is_none());

    // Same email again, different case: still a conflict
    let payload = serde_json::json!({
        "email": format!("DUP_{tag}@example.com"),
        "username": format!("other_{tag}"),
        "password": "hunter2hunter2",
    })
    .to_string();
    let response = app
        .clone()
        .oneshot(common::json_request("POST", "/api/v2/users/register", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn test_login_failures() {
    require_emulator!();
    let (app, _) = common::create_emulator_app().await;
    let (_, _, email) = common::register_and_login(&app).await;

    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/api/v2/users/login",
            &serde_json::json!({"email": email, "password": "wrong-password"}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Invalid user credentials");

    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/api/v2/users/login",
            &serde_json::json!({"email": "nobody@example.com", "password": "whatever1"})
                .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "User does not exist");
}

#[tokio::test]
async fn test_login_sets_cookies() {
    require_emulator!();
    let (app, _) = common::create_emulator_app().await;

    let tag = uuid::Uuid::new_v4().simple().to_string();
    let email = format!("cookie_{tag}@example.com");
    app.clone()
        .oneshot(common::json_request(
            "POST",
            "/api/v2/users/register",
            &serde_json::json!({
                "email": email,
                "username": format!("cookie_{tag}"),
                "password": "hunter2hunter2",
            })
            .to_string(),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/api/v2/users/login",
            &serde_json::json!({"email": email, "password": "hunter2hunter2"}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = common::set_cookie_headers(&response);
    let access = common::find_cookie(&cookies, "accessToken");
    let refresh = common::find_cookie(&cookies, "refreshToken");
    assert!(access.contains("HttpOnly"));
    assert!(refresh.contains("HttpOnly"));
    assert!(access.contains("SameSite=Lax"));
}

#[tokio::test]
async fn test_refresh_rotation_and_reuse_detection() {
    require_emulator!();
    let (app, _) = common::create_emulator_app().await;
    let (_, first_refresh, _) = common::register_and_login(&app).await;

    // First use rotates the pair
    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/api/v2/users/refresh-token",
            &serde_json::json!({"refreshToken": first_refresh}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    let second_refresh = body["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(second_refresh, first_refresh);

    // Replaying the superseded token must fail
    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/api/v2/users/refresh-token",
            &serde_json::json!({"refreshToken": first_refresh}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Refresh token is expired or used");

    // The rotated token still works
    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/api/v2/users/refresh-token",
            &serde_json::json!({"refreshToken": second_refresh}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_accepts_cookie() {
    require_emulator!();
    let (app, _) = common::create_emulator_app().await;
    let (_, refresh, _) = common::register_and_login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v2/users/refresh-token")
                .header(header::COOKIE, format!("refreshToken={refresh}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_me_returns_sanitized_user() {
    require_emulator!();
    let (app, _) = common::create_emulator_app().await;
    let (access, _, email) = common::register_and_login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v2/users/me")
                .header(header::COOKIE, format!("accessToken={access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_json(response).await;
    assert_eq!(body["email"], email);
    assert_eq!(body["authProvider"], "local");
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("refreshTokenCurrent").is_none());
}

#[tokio::test]
async fn test_logout_cuts_refresh_path() {
    require_emulator!();
    let (app, _) = common::create_emulator_app().await;
    let (access, refresh, _) = common::register_and_login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v2/users/logout")
                .header(header::AUTHORIZATION, format!("Bearer {access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Removal cookies are sent for the whole trio
    let cookies = common::set_cookie_headers(&response);
    assert!(common::cookie_value(&common::find_cookie(&cookies, "accessToken")).is_empty());
    assert!(common::cookie_value(&common::find_cookie(&cookies, "refreshToken")).is_empty());

    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/api/v2/users/refresh-token",
            &serde_json::json!({"refreshToken": refresh}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_requires_current() {
    require_emulator!();
    let (app, _) = common::create_emulator_app().await;
    let (access, _, email) = common::register_and_login(&app).await;

    let mut request = common::json_request(
        "PUT",
        "/api/v2/users/change-password",
        &serde_json::json!({
            "currentPassword": "not-the-password",
            "newPassword": "brand-new-pw-1",
        })
        .to_string(),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {access}").parse().unwrap(),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Old password still works after the failed attempt
    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/api/v2/users/login",
            &serde_json::json!({"email": email, "password": "hunter2hunter2"}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut request = common::json_request(
        "PUT",
        "/api/v2/users/change-password",
        &serde_json::json!({
            "currentPassword": "hunter2hunter2",
            "newPassword": "brand-new-pw-1",
        })
        .to_string(),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {access}").parse().unwrap(),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/api/v2/users/login",
            &serde_json::json!({"email": email, "password": "brand-new-pw-1"}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_email_verification_gates_chat() {
    require_emulator!();
    let (app, state) = common::create_emulator_app().await;
    let (access, _, email) = common::register_and_login(&app).await;

    // Unverified: chat is forbidden
    let mut request = common::json_request(
        "POST",
        "/api/v2/chat/chat",
        &serde_json::json!({"message": "Suggest a habit"}).to_string(),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {access}").parse().unwrap(),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Verify your email first");

    // Request a verification email (the disabled mailer drops it, but
    // the token is persisted) and consume the token
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/v2/users/send-verification-email")
        .body(Body::empty())
        .unwrap();
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {access}").parse().unwrap(),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = state
        .store
        .find_user_by_email(&email)
        .await
        .unwrap()
        .expect("registered user exists");
    let token = user.email_verification_token.expect("token persisted");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/v2/users/verify-email?token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Verified now; chat passes the email gate and fails only because
    // no assistant is configured in the test app
    let mut request = common::json_request(
        "POST",
        "/api/v2/chat/chat",
        &serde_json::json!({"message": "Suggest a habit"}).to_string(),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {access}").parse().unwrap(),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Chat assistant is not configured");
}

#[tokio::test]
async fn test_oauth_login_links_existing_local_account() {
    require_emulator!();
    let (app, state) = common::create_emulator_app().await;
    let (_, _, email) = common::register_and_login(&app).await;

    let local = state
        .store
        .find_user_by_email(&email)
        .await
        .unwrap()
        .expect("registered user exists");
    assert_eq!(local.auth_provider, AuthProvider::Local);
    assert!(local.external_auth_id.is_none());

    // The same email arriving from Google must link, not duplicate
    let profile = ProviderProfile {
        id: format!("google-{}", uuid::Uuid::new_v4().simple()),
        email: Some(email.to_uppercase()),
        display_name: "Linked Account".to_string(),
        avatar_url: Some("https://example.com/avatar.png".to_string()),
    };
    let (linked, tokens) = state
        .auth
        .oauth_login(AuthProvider::Google, &profile)
        .await
        .unwrap();

    assert_eq!(linked.id, local.id);
    assert_eq!(linked.auth_provider, AuthProvider::Google);
    assert_eq!(linked.external_auth_id.as_deref(), Some(profile.id.as_str()));
    assert_eq!(
        linked.profile_picture.as_deref(),
        Some("https://example.com/avatar.png")
    );

    // Logging in again with the provider resolves to the same identity
    let (again, _) = state
        .auth
        .oauth_login(AuthProvider::Google, &profile)
        .await
        .unwrap();
    assert_eq!(again.id, local.id);

    // The issued access token is live and reflects the linked provider
    let mut request = Request::builder()
        .method("GET")
        .uri("/api/v2/users/me")
        .body(Body::empty())
        .unwrap();
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", tokens.access_token).parse().unwrap(),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["authProvider"], "google");
}
