// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily journal entries, newest first.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::models::JournalEntry;
use crate::routes::MessageResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/journal", get(list_entries).post(create_entry))
        .route("/journal/{id}", delete(delete_entry))
}

#[derive(Deserialize)]
struct CreateEntryRequest {
    content: Option<String>,
    mood: Option<String>,
}

async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<JournalEntry>>, AppError> {
    let entries = state.store.journal_for_owner(&current.user.id).await?;
    Ok(Json(entries))
}

async fn create_entry(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<CreateEntryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let content = body
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("Content is required".to_string()))?;
    let mood = body
        .mood
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    let entry = JournalEntry::new(current.user.id.clone(), content, mood, Utc::now());
    state.store.upsert_journal_entry(&entry).await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let entry = state
        .store
        .get_journal_entry(&id)
        .await?
        .filter(|entry| entry.owner_id == current.user.id)
        .ok_or_else(|| AppError::NotFound("Journal entry not found".to_string()))?;

    state.store.delete_journal_entry(&entry.id).await?;
    Ok(Json(MessageResponse::ok("Journal entry deleted")))
}
