// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Habit CRUD and the daily check-in.
//!
//! Listing reconciles the cached `completedToday` flag against the
//! current server-local day before responding, so a habit checked
//! yesterday shows up unchecked this morning without any scheduled job.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::models::{Habit, HabitCheckIn, HabitView};
use crate::routes::MessageResponse;
use crate::time_utils::{local_day, today};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/habits", get(list_habits).post(create_habit))
        .route("/habits/{id}/check", patch(check_in))
        .route("/habits/{id}", delete(delete_habit))
}

#[derive(Deserialize)]
struct CreateHabitRequest {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    color: Option<String>,
}

async fn list_habits(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<HabitView>>, AppError> {
    let mut habits = state.store.habits_for_owner(&current.user.id).await?;

    let today = today();
    let mut changed = Vec::new();
    for habit in habits.iter_mut() {
        if habit.reconcile_daily_flag(today) {
            changed.push(habit.clone());
        }
    }
    if !changed.is_empty() {
        state.store.batch_upsert_habits(&changed).await?;
        tracing::debug!(count = changed.len(), "Reset stale completedToday flags");
    }

    Ok(Json(habits.iter().map(HabitView::from).collect()))
}

async fn create_habit(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<CreateHabitRequest>,
) -> Result<impl IntoResponse, AppError> {
    // An empty title is allowed; the storage schema only trims it
    let title = body.title.map(|t| t.trim().to_string()).unwrap_or_default();

    let habit = Habit::new(
        current.user.id.clone(),
        title,
        normalize(body.description),
        normalize(body.category),
        normalize(body.color),
        Utc::now(),
    );
    state.store.upsert_habit(&habit).await?;

    Ok((StatusCode::CREATED, Json(HabitView::from(&habit))))
}

/// Check a habit off for the current server-local day.
///
/// The habit document guards the common case, but the authoritative
/// arbiter is the create-only marker insert: of two concurrent check-ins
/// on the same day exactly one creates the marker. The loser gets a
/// conflict and the habit document is never double-counted.
async fn check_in(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<HabitView>, AppError> {
    let mut habit = owned_habit(&state, &current.user.id, &id).await?;

    let now = Utc::now();
    if !habit.apply_check_in(now) {
        return Err(AppError::Conflict(
            "Habit already completed today".to_string(),
        ));
    }

    let marker = HabitCheckIn::new(&habit, local_day(now), now);
    if !state.store.insert_check_in(&marker).await? {
        return Err(AppError::Conflict(
            "Habit already completed today".to_string(),
        ));
    }

    if let Err(e) = state.store.upsert_habit(&habit).await {
        // Roll the marker back so a retry is not locked out for the day
        if let Err(cleanup) = state.store.delete_check_in(&marker.id).await {
            tracing::warn!(
                marker_id = %marker.id,
                error = %cleanup,
                "Failed to remove check-in marker after habit write failure"
            );
        }
        return Err(e);
    }

    tracing::info!(habit_id = %habit.id, streak = habit.streak, "Habit checked in");
    Ok(Json(HabitView::from(&habit)))
}

async fn delete_habit(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let habit = owned_habit(&state, &current.user.id, &id).await?;
    state.store.delete_habit(&habit.id).await?;

    // Orphaned markers are harmless, so cleanup is best-effort
    match state.store.delete_check_ins_for_habit(&habit.id).await {
        Ok(removed) if removed > 0 => {
            tracing::debug!(habit_id = %habit.id, removed, "Removed check-in markers");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(habit_id = %habit.id, error = %e, "Failed to clean up check-in markers");
        }
    }

    Ok(Json(MessageResponse::ok("Habit deleted successfully")))
}

/// Fetch a habit visible to `owner_id`. Habits owned by someone else
/// look exactly like missing ones.
async fn owned_habit(
    state: &Arc<AppState>,
    owner_id: &str,
    habit_id: &str,
) -> Result<Habit, AppError> {
    state
        .store
        .get_habit(habit_id)
        .await?
        .filter(|habit| habit.owner_id == owner_id)
        .ok_or_else(|| AppError::NotFound("Habit not found".to_string()))
}

fn normalize(field: Option<String>) -> Option<String> {
    field.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
