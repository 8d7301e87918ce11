// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared-key authentication for operator-only endpoints.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Require the admin shared key for broadcast-style endpoints.
pub async fn require_admin_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if presented.is_empty() || presented != state.config.admin_api_key {
        tracing::warn!("Blocked admin request with missing or wrong key");
        return Err(AppError::Unauthorized("Invalid admin key".to_string()));
    }

    Ok(next.run(request).await)
}
