//! Newsletter subscriber model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mailing-list subscriber stored in Firestore. Emails are stored
/// lowercased; duplicates are rejected at subscribe time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    /// UUID, also used as the document ID
    pub id: String,
    pub email: String,
    pub subscribed_at: DateTime<Utc>,
}

impl Subscriber {
    pub fn new(email: String, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            subscribed_at: now,
        }
    }
}
