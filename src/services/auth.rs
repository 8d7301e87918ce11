// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential issuing, validation and rotation.
//!
//! Handles:
//! - Local registration and login (bcrypt-hashed passwords)
//! - Access/refresh token pairs with rotation-on-use
//! - Refresh-token reuse detection via the single stored slot
//! - Bridging OAuth provider identities into the same user model

use crate::db::Store;
use crate::error::AppError;
use crate::middleware::auth::{create_access_token, create_refresh_token, decode_refresh_token};
use crate::models::{AuthProvider, User};
use crate::services::oauth::ProviderProfile;
use chrono::Utc;

/// bcrypt cost factor; verification lands around 100ms on current hardware.
const PASSWORD_HASH_COST: u32 = 10;

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Authentication service over the user store.
#[derive(Clone)]
pub struct AuthService {
    store: Store,
    access_token_secret: Vec<u8>,
    refresh_token_secret: Vec<u8>,
    access_token_ttl_minutes: i64,
    refresh_token_ttl_days: i64,
}

impl AuthService {
    pub fn new(store: Store, config: &crate::config::Config) -> Self {
        Self {
            store,
            access_token_secret: config.access_token_secret.clone(),
            refresh_token_secret: config.refresh_token_secret.clone(),
            access_token_ttl_minutes: config.access_token_ttl_minutes,
            refresh_token_ttl_days: config.refresh_token_ttl_days,
        }
    }

    /// Create a local identity. Email and username are lowercased before
    /// the uniqueness check, so lookups are case-insensitive.
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let email = email.trim().to_lowercase();
        let username = username.trim().to_lowercase();

        if self.store.find_user_by_email(&email).await?.is_some()
            || self.store.find_user_by_username(&username).await?.is_some()
        {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(password)?;
        let user = User::new_local(email, username, password_hash, Utc::now());
        self.store.upsert_user(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Log in with an email or username plus password. Issues a token
    /// pair and overwrites the stored refresh slot, invalidating any
    /// earlier session.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<(User, TokenPair), AppError> {
        let identifier = identifier.trim().to_lowercase();

        let user = match self.store.find_user_by_email(&identifier).await? {
            Some(user) => user,
            None => self
                .store
                .find_user_by_username(&identifier)
                .await?
                .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?,
        };

        // OAuth-only accounts have no hash and cannot password-login
        let password_hash = user
            .password_hash
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("Invalid user credentials".to_string()))?;

        if !verify_password(password, password_hash)? {
            return Err(AppError::Unauthorized("Invalid user credentials".to_string()));
        }

        self.issue_token_pair(user).await
    }

    /// Exchange a refresh token for a new pair (rotation-on-use).
    ///
    /// A cryptographically valid token that no longer matches the
    /// stored slot was already rotated out; presenting it again is the
    /// reuse case and fails without issuing anything.
    pub async fn refresh(&self, presented: &str) -> Result<(User, TokenPair), AppError> {
        let claims = decode_refresh_token(presented, &self.refresh_token_secret)
            .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

        let user = self
            .store
            .get_user(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

        if user.refresh_token_current.as_deref() != Some(presented) {
            tracing::warn!(user_id = %user.id, "Rejected reused or superseded refresh token");
            return Err(AppError::Unauthorized(
                "Refresh token is expired or used".to_string(),
            ));
        }

        self.issue_token_pair(user).await
    }

    /// Clear the stored refresh slot. The outstanding access token stays
    /// valid until natural expiry; only the refresh path is cut off.
    pub async fn logout(&self, user_id: &str) -> Result<(), AppError> {
        if let Some(mut user) = self.store.get_user(user_id).await? {
            user.refresh_token_current = None;
            user.updated_at = Utc::now();
            self.store.upsert_user(&user).await?;
        }
        Ok(())
    }

    /// Log in (or sign up) with an OAuth provider profile.
    ///
    /// A profile whose email matches an existing identity links to it
    /// instead of creating a duplicate; missing provider linkage is
    /// backfilled on the way through.
    pub async fn oauth_login(
        &self,
        provider: AuthProvider,
        profile: &ProviderProfile,
    ) -> Result<(User, TokenPair), AppError> {
        let email = profile
            .email
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("No email received from provider".to_string()))?
            .trim()
            .to_lowercase();

        let existing = match self.store.find_user_by_email(&email).await? {
            Some(user) => Some(user),
            None => {
                self.store
                    .find_user_by_provider(provider, &profile.id)
                    .await?
            }
        };

        let user = match existing {
            Some(mut user) => {
                let mut changed = false;
                if user.auth_provider == AuthProvider::Local {
                    user.auth_provider = provider;
                    changed = true;
                }
                if user.external_auth_id.is_none() {
                    user.external_auth_id = Some(profile.id.clone());
                    changed = true;
                }
                if user.profile_picture.is_none() && profile.avatar_url.is_some() {
                    user.profile_picture = profile.avatar_url.clone();
                    changed = true;
                }
                if changed {
                    user.updated_at = Utc::now();
                    self.store.upsert_user(&user).await?;
                    tracing::info!(user_id = %user.id, provider = provider.as_str(), "Linked OAuth provider to existing account");
                }
                user
            }
            None => {
                let username = derive_username(&profile.display_name);
                let user = User::new_oauth(
                    provider,
                    profile.id.clone(),
                    email,
                    username,
                    profile.avatar_url.clone(),
                    Utc::now(),
                );
                self.store.upsert_user(&user).await?;
                tracing::info!(user_id = %user.id, provider = provider.as_str(), "Created account from OAuth profile");
                user
            }
        };

        self.issue_token_pair(user).await
    }

    /// Rotate a local password after verifying the current one.
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let mut user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let password_hash = user.password_hash.as_deref().ok_or_else(|| {
            AppError::Validation("Account has no local password".to_string())
        })?;

        if !verify_password(current_password, password_hash)? {
            return Err(AppError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        user.password_hash = Some(hash_password(new_password)?);
        user.updated_at = Utc::now();
        self.store.upsert_user(&user).await?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Mint a token pair and persist the refresh token as the single
    /// valid slot on the user.
    async fn issue_token_pair(&self, mut user: User) -> Result<(User, TokenPair), AppError> {
        let access_token = create_access_token(
            &user,
            &self.access_token_secret,
            self.access_token_ttl_minutes,
        )?;
        let refresh_token =
            create_refresh_token(&user.id, &self.refresh_token_secret, self.refresh_token_ttl_days)?;

        user.refresh_token_current = Some(refresh_token.clone());
        user.updated_at = Utc::now();
        self.store.upsert_user(&user).await?;

        Ok((
            user,
            TokenPair {
                access_token,
                refresh_token,
            },
        ))
    }
}

fn hash_password(password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, PASSWORD_HASH_COST)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    bcrypt::verify(password, hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password verification failed: {}", e)))
}

/// Usernames for OAuth signups come from the display name, lowercased
/// with whitespace runs collapsed to underscores.
fn derive_username(display_name: &str) -> String {
    display_name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
