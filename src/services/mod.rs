// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod assistant;
pub mod auth;
pub mod images;
pub mod mail;
pub mod oauth;

pub use assistant::{Assistant, ChatReply};
pub use auth::{AuthService, TokenPair};
pub use images::{ImageHost, UploadedImage};
pub use mail::Mailer;
pub use oauth::{OAuthClient, ProviderProfile};

use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Shared response handling for the outbound JSON clients: a non-2xx
/// status becomes an upstream error carrying the body, and a success
/// body must deserialize as `T`.
pub(crate) async fn check_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Upstream(format!(
            "{} failed with status {}: {}",
            context, status, body
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| AppError::Upstream(format!("{} returned invalid JSON: {}", context, e)))
}
