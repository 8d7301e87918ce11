// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Newsletter signup and the operator broadcast endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{middleware, Json, Router};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::admin::require_admin_key;
use crate::models::Subscriber;
use crate::routes::MessageResponse;
use crate::AppState;

/// Cap on concurrent SMTP sends during a broadcast.
const MAX_CONCURRENT_MAIL_SENDS: usize = 10;

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route("/newsletter/send-update", post(send_update))
        .route_layer(middleware::from_fn_with_state(state, require_admin_key));

    Router::new()
        .route("/newsletter/subscribe", post(subscribe))
        .merge(admin)
}

#[derive(Deserialize)]
struct SubscribeRequest {
    email: Option<String>,
}

#[derive(Deserialize)]
struct SendUpdateRequest {
    subject: Option<String>,
    message: Option<String>,
}

async fn subscribe(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = body
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| plausible_email(e))
        .ok_or_else(|| AppError::Validation("A valid email is required".to_string()))?;

    if state.store.find_subscriber_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email is already subscribed".to_string()));
    }

    let subscriber = Subscriber::new(email, Utc::now());
    state.store.upsert_subscriber(&subscriber).await?;
    tracing::info!(email = %subscriber.email, "Newsletter subscription added");

    if let Err(e) = state
        .mailer
        .send(
            &subscriber.email,
            "Welcome to the HabitMate newsletter",
            confirmation_body(),
        )
        .await
    {
        tracing::warn!(email = %subscriber.email, error = %e, "Failed to send subscription confirmation");
    }

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok("Subscribed to newsletter")),
    ))
}

/// Broadcast an update to every subscriber. Individual send failures
/// are logged and skipped; the response reports how many went out.
async fn send_update(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendUpdateRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let subject = body
        .subject
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let message = body
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    let (Some(subject), Some(message)) = (subject, message) else {
        return Err(AppError::Validation(
            "Subject and message are required".to_string(),
        ));
    };

    let subscribers = state.store.list_subscribers().await?;
    let total = subscribers.len();
    let html = newsletter_body(&message);

    let sends = subscribers.into_iter().map(|subscriber| {
        let mailer = state.mailer.clone();
        let subject = subject.clone();
        let html = html.clone();
        async move {
            let outcome = mailer.send(&subscriber.email, &subject, html).await;
            (subscriber.email, outcome)
        }
    });
    let results: Vec<_> = stream::iter(sends)
        .buffer_unordered(MAX_CONCURRENT_MAIL_SENDS)
        .collect()
        .await;

    let mut sent = 0usize;
    for (email, outcome) in results {
        match outcome {
            Ok(()) => sent += 1,
            Err(e) => tracing::warn!(email = %email, error = %e, "Newsletter send failed"),
        }
    }

    tracing::info!(sent, total, "Newsletter broadcast finished");
    Ok(Json(MessageResponse::ok(format!(
        "Newsletter sent to {} subscribers",
        sent
    ))))
}

fn plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn confirmation_body() -> String {
    "<p>Thanks for subscribing to the HabitMate newsletter!</p>\
     <p>We send occasional updates about new features and habit-building tips.</p>"
        .to_string()
}

fn newsletter_body(message: &str) -> String {
    format!(
        "<div><p>{}</p><hr/>\
         <p>You are receiving this because you subscribed to HabitMate updates.</p></div>",
        message
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausible_email() {
        assert!(plausible_email("ada@example.com"));
        assert!(plausible_email("a.b+tag@sub.example.org"));
        assert!(!plausible_email("nodomain@"));
        assert!(!plausible_email("@example.com"));
        assert!(!plausible_email("bare-string"));
        assert!(!plausible_email("dot@.leading"));
        assert!(!plausible_email("dot@trailing."));
    }
}
