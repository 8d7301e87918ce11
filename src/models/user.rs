//! User identity model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an identity authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
    Github,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Local => "local",
            AuthProvider::Google => "google",
            AuthProvider::Github => "github",
        }
    }
}

/// User identity stored in Firestore.
///
/// Local accounts carry a password hash; OAuth accounts carry the
/// provider linkage instead. Email and username are stored lowercased so
/// uniqueness checks are case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// UUID, also used as the document ID
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    /// bcrypt hash, present only for locally-registered identities
    pub password_hash: Option<String>,
    pub auth_provider: AuthProvider,
    /// Provider-assigned id, set only for OAuth identities
    pub external_auth_id: Option<String>,
    /// The single currently-valid refresh token (rotated on use)
    pub refresh_token_current: Option<String>,
    pub email_verified: bool,
    pub email_verification_token: Option<String>,
    pub email_verification_expires: Option<DateTime<Utc>>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    /// Image-host id of the current avatar, needed to delete it on replace
    pub profile_picture_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a locally-registered identity. Email and username are
    /// expected pre-lowercased by the caller.
    pub fn new_local(
        email: String,
        username: String,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email),
            username: Some(username),
            password_hash: Some(password_hash),
            auth_provider: AuthProvider::Local,
            external_auth_id: None,
            refresh_token_current: None,
            email_verified: false,
            email_verification_token: None,
            email_verification_expires: None,
            bio: None,
            profile_picture: None,
            profile_picture_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an identity from an OAuth provider profile. Provider
    /// emails are trusted as verified.
    pub fn new_oauth(
        provider: AuthProvider,
        external_auth_id: String,
        email: String,
        username: String,
        profile_picture: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email),
            username: Some(username),
            password_hash: None,
            auth_provider: provider,
            external_auth_id: Some(external_auth_id),
            refresh_token_current: None,
            email_verified: true,
            email_verification_token: None,
            email_verification_expires: None,
            bio: None,
            profile_picture,
            profile_picture_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy with secret fields cleared, for attaching to request context.
    pub fn sanitized(mut self) -> Self {
        self.password_hash = None;
        self.refresh_token_current = None;
        self.email_verification_token = None;
        self
    }
}

/// Public view of an identity, returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub auth_provider: AuthProvider,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            auth_provider: user.auth_provider,
            bio: user.bio.clone(),
            profile_picture: user.profile_picture.clone(),
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}
