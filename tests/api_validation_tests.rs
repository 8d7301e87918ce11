// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request validation tests for the public endpoints.
//!
//! These run against the offline app: every case here must be rejected
//! before any Firestore access, so the mock store is never touched and
//! the error envelope can be asserted exactly.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

fn json_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_register_requires_all_fields() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(json_post(
            "/api/v2/users/register",
            r#"{"email": "ada@example.com"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "All fields are required");
}

#[tokio::test]
async fn test_register_rejects_blank_fields() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(json_post(
            "/api/v2/users/register",
            r#"{"email": "  ", "username": "ada", "password": "pw123456"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "All fields are required");
}

#[tokio::test]
async fn test_login_requires_identifier() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(json_post(
            "/api/v2/users/login",
            r#"{"password": "pw123456"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Username or email is required");
}

#[tokio::test]
async fn test_login_requires_password() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(json_post(
            "/api/v2/users/login",
            r#"{"email": "ada@example.com"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Password is required");
}

#[tokio::test]
async fn test_refresh_without_token_is_unauthorized() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(json_post("/api/v2/users/refresh-token", r#"{}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Unauthorized request");
}

#[tokio::test]
async fn test_refresh_with_garbage_token_is_rejected() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(json_post(
            "/api/v2/users/refresh-token",
            r#"{"refreshToken": "definitely-not-a-jwt"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Invalid refresh token");
}

#[tokio::test]
async fn test_subscribe_requires_valid_email() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(json_post("/api/v2/newsletter/subscribe", r#"{}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (app, _) = common::create_test_app();
    let response = app
        .oneshot(json_post(
            "/api/v2/newsletter/subscribe",
            r#"{"email": "not-an-email"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "A valid email is required");
}

#[tokio::test]
async fn test_send_update_requires_admin_key() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(json_post(
            "/api/v2/newsletter/send-update",
            r#"{"subject": "Hi", "message": "News"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Invalid admin key");
}

#[tokio::test]
async fn test_send_update_rejects_wrong_admin_key() {
    let (app, _) = common::create_test_app();

    let mut request = json_post(
        "/api/v2/newsletter/send-update",
        r#"{"subject": "Hi", "message": "News"}"#,
    );
    request
        .headers_mut()
        .insert("x-admin-key", "wrong_key".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_send_update_validates_fields_with_good_key() {
    let (app, state) = common::create_test_app();

    let mut request = json_post("/api/v2/newsletter/send-update", r#"{"subject": "Hi"}"#);
    request.headers_mut().insert(
        "x-admin-key",
        state.config.admin_api_key.parse().unwrap(),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Subject and message are required");
}

#[tokio::test]
async fn test_verify_email_requires_token() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v2/users/verify-email")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["message"], "Verification token is required");
}
