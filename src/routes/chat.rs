// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AI coaching chat, proxied through the configured assistant.

use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::services::ChatReply;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat/chat", post(chat))
}

#[derive(Deserialize)]
struct ChatRequest {
    message: Option<String>,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let message = body
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::Validation("Message is required".to_string()))?;

    if !current.user.email_verified {
        return Err(AppError::Forbidden("Verify your email first".to_string()));
    }

    let assistant = state
        .assistant
        .as_ref()
        .ok_or_else(|| AppError::Validation("Chat assistant is not configured".to_string()))?;

    let reply = assistant.chat(&message).await?;
    Ok(Json(reply))
}
