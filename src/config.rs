//! Application configuration loaded from environment variables.
//!
//! Required secrets fail startup when missing; optional integrations
//! (OAuth providers, SMTP, image host, chat upstream) degrade to disabled
//! when their variables are absent.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Frontend URL for OAuth redirects and CORS
    pub frontend_url: String,
    /// Public base URL of this API (verification links, OAuth callbacks)
    pub backend_url: String,
    /// GCP project ID for Firestore
    pub gcp_project_id: String,
    /// Whether cookies get production attributes (Secure, SameSite=None)
    pub production: bool,

    // --- Secrets ---
    /// HMAC key for access tokens (raw bytes)
    pub access_token_secret: Vec<u8>,
    /// HMAC key for refresh tokens (raw bytes)
    pub refresh_token_secret: Vec<u8>,
    /// Key for signing the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
    /// Shared key gating the newsletter broadcast endpoint
    pub admin_api_key: String,

    // --- Token lifetimes ---
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,

    // --- Optional integrations ---
    pub google_oauth: Option<OAuthProviderConfig>,
    pub github_oauth: Option<OAuthProviderConfig>,
    pub smtp: Option<SmtpConfig>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub deepseek_api_key: Option<String>,
}

/// OAuth client credentials for one provider.
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// SMTP relay credentials for outbound mail.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// Sender mailbox, e.g. `HabitMate <no-reply@habitmate.app>`
    pub from: String,
}

/// Cloudinary credentials for avatar uploads.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Lifetime of server-side OAuth sessions.
pub const SESSION_TTL_DAYS: i64 = 7;

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            production: env::var("APP_ENV")
                .map(|v| v == "production")
                .unwrap_or(false),

            access_token_secret: env::var("ACCESS_TOKEN_SECRET")
                .map_err(|_| ConfigError::Missing("ACCESS_TOKEN_SECRET"))?
                .into_bytes(),
            refresh_token_secret: env::var("REFRESH_TOKEN_SECRET")
                .map_err(|_| ConfigError::Missing("REFRESH_TOKEN_SECRET"))?
                .into_bytes(),
            // Falls back to the refresh secret so a separate key is optional
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map(String::into_bytes)
                .or_else(|_| {
                    env::var("REFRESH_TOKEN_SECRET")
                        .map(String::into_bytes)
                        .map_err(|_| ConfigError::Missing("REFRESH_TOKEN_SECRET"))
                })?,
            admin_api_key: env::var("ADMIN_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("ADMIN_API_KEY"))?,

            access_token_ttl_minutes: env::var("ACCESS_TOKEN_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            refresh_token_ttl_days: env::var("REFRESH_TOKEN_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),

            google_oauth: oauth_provider_from_env("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            github_oauth: oauth_provider_from_env("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
            smtp: smtp_from_env(),
            cloudinary: cloudinary_from_env(),
            deepseek_api_key: env::var("DEEPSEEK_API_KEY").ok(),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 8000,
            frontend_url: "http://localhost:5173".to_string(),
            backend_url: "http://localhost:8000".to_string(),
            gcp_project_id: "test-project".to_string(),
            production: false,
            access_token_secret: b"test_access_secret_32_bytes_min!".to_vec(),
            refresh_token_secret: b"test_refresh_secret_32_bytes_ok!".to_vec(),
            oauth_state_key: b"test_state_key".to_vec(),
            admin_api_key: "test_admin_key".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            google_oauth: Some(OAuthProviderConfig {
                client_id: "test_google_client_id".to_string(),
                client_secret: "test_google_client_secret".to_string(),
            }),
            github_oauth: Some(OAuthProviderConfig {
                client_id: "test_github_client_id".to_string(),
                client_secret: "test_github_client_secret".to_string(),
            }),
            smtp: None,
            cloudinary: None,
            deepseek_api_key: None,
        }
    }
}

/// Read an OAuth provider credential pair; both must be present.
fn oauth_provider_from_env(id_var: &str, secret_var: &str) -> Option<OAuthProviderConfig> {
    match (env::var(id_var).ok(), env::var(secret_var).ok()) {
        (Some(client_id), Some(client_secret)) => Some(OAuthProviderConfig {
            client_id,
            client_secret,
        }),
        _ => None,
    }
}

fn smtp_from_env() -> Option<SmtpConfig> {
    Some(SmtpConfig {
        host: env::var("SMTP_HOST").ok()?,
        username: env::var("SMTP_USERNAME").ok()?,
        password: env::var("SMTP_PASSWORD").ok()?,
        from: env::var("MAIL_FROM").ok()?,
    })
}

fn cloudinary_from_env() -> Option<CloudinaryConfig> {
    Some(CloudinaryConfig {
        cloud_name: env::var("CLOUDINARY_CLOUD_NAME").ok()?,
        api_key: env::var("CLOUDINARY_API_KEY").ok()?,
        api_secret: env::var("CLOUDINARY_API_SECRET").ok()?,
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
