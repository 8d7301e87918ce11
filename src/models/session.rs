// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side session records for the OAuth flow.
//!
//! JWT cookies are the primary credential; sessions exist so the OAuth
//! callback can also establish a revocable server-side login. The `sid`
//! cookie holds the session id and is checked before the access token.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const SESSION_ID_LEN: usize = 64;
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Session stored in Firestore, keyed by its random id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: String, ttl_days: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_session_id(),
            user_id,
            created_at: now,
            expires_at: now + Duration::days(ttl_days),
        }
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Random alphanumeric session id, long enough to be unguessable.
fn generate_session_id() -> String {
    let mut rng = rand::rng();
    (0..SESSION_ID_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
