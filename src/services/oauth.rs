// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound OAuth client for Google and GitHub.
//!
//! Each provider flow is the same two hops: exchange the authorization
//! code for an access token, then fetch the profile with it. Both are
//! normalized into a [`ProviderProfile`] so the auth service never sees
//! provider-specific shapes.

use reqwest::header;
use serde::Deserialize;

use crate::config::OAuthProviderConfig;
use crate::error::AppError;
use crate::services::check_response_json;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_API_BASE: &str = "https://api.github.com";

/// Provider identity normalized to the fields the app cares about.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    /// Provider-scoped stable user id.
    pub id: String,
    pub email: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Run the Google code-for-profile exchange.
    pub async fn exchange_google(
        &self,
        code: &str,
        redirect_uri: &str,
        creds: &OAuthProviderConfig,
    ) -> Result<ProviderProfile, AppError> {
        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", &creds.client_id),
                ("client_secret", &creds.client_secret),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Google token request failed: {}", e)))?;
        let token: GoogleTokenResponse =
            check_response_json(response, "Google token exchange").await?;

        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Google userinfo request failed: {}", e)))?;
        let profile: GoogleProfile =
            check_response_json(response, "Google userinfo").await?;

        let display_name = display_name_or_email_prefix(profile.name, profile.email.as_deref());
        Ok(ProviderProfile {
            id: profile.sub,
            email: profile.email,
            display_name,
            avatar_url: profile.picture,
        })
    }

    /// Run the GitHub code-for-profile exchange. Falls back to the
    /// emails endpoint when the profile email is private.
    pub async fn exchange_github(
        &self,
        code: &str,
        redirect_uri: &str,
        creds: &OAuthProviderConfig,
    ) -> Result<ProviderProfile, AppError> {
        let response = self
            .http
            .post(GITHUB_TOKEN_URL)
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("code", code),
                ("client_id", &creds.client_id),
                ("client_secret", &creds.client_secret),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("GitHub token request failed: {}", e)))?;
        let token: GithubTokenResponse =
            check_response_json(response, "GitHub token exchange").await?;

        // GitHub reports a bad code as 200 with an error body
        let access_token = token.access_token.ok_or_else(|| {
            AppError::Upstream(format!(
                "GitHub token exchange rejected: {}",
                token.error_description.unwrap_or_default()
            ))
        })?;

        let response = self
            .http
            .get(format!("{}/user", GITHUB_API_BASE))
            .header(header::USER_AGENT, "habitmate")
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("GitHub user request failed: {}", e)))?;
        let profile: GithubUser = check_response_json(response, "GitHub user").await?;

        let email = match profile.email {
            Some(email) => Some(email),
            None => self.github_primary_email(&access_token).await?,
        };

        let display_name = profile
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(profile.login);
        Ok(ProviderProfile {
            id: profile.id.to_string(),
            email,
            display_name,
            avatar_url: profile.avatar_url,
        })
    }

    /// Profiles with a private email need the /user/emails scope hop.
    async fn github_primary_email(&self, access_token: &str) -> Result<Option<String>, AppError> {
        let response = self
            .http
            .get(format!("{}/user/emails", GITHUB_API_BASE))
            .header(header::USER_AGENT, "habitmate")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("GitHub emails request failed: {}", e)))?;
        let emails: Vec<GithubEmail> =
            check_response_json(response, "GitHub emails").await?;
        Ok(pick_github_email(emails))
    }
}

impl Default for OAuthClient {
    fn default() -> Self {
        Self::new()
    }
}

fn display_name_or_email_prefix(name: Option<String>, email: Option<&str>) -> String {
    name.filter(|n| !n.trim().is_empty())
        .or_else(|| {
            email.map(|e| e.split('@').next().unwrap_or("user").to_string())
        })
        .unwrap_or_else(|| "user".to_string())
}

/// Prefer the primary verified address, then any verified one.
fn pick_github_email(emails: Vec<GithubEmail>) -> Option<String> {
    let mut verified = None;
    for entry in emails {
        if !entry.verified {
            continue;
        }
        if entry.primary {
            return Some(entry.email);
        }
        verified.get_or_insert(entry.email);
    }
    verified
}

#[derive(Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleProfile {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Deserialize)]
struct GithubTokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct GithubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}
