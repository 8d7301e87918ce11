//! Journal entry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MOOD: &str = "Neutral";

/// Journal entry stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    /// UUID, also used as the document ID
    pub id: String,
    pub owner_id: String,
    pub content: String,
    pub mood: String,
    pub date: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(owner_id: String, content: String, mood: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id,
            content,
            mood: mood.unwrap_or_else(|| DEFAULT_MOOD.to_string()),
            date: now,
        }
    }
}
