//! Database layer (Firestore).

pub mod store;

pub use store::Store;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const HABITS: &str = "habits";
    /// Per-(habit, day) check-in markers (keyed `{habit_id}_{YYYY-MM-DD}`)
    pub const HABIT_CHECKINS: &str = "habit_checkins";
    pub const JOURNAL_ENTRIES: &str = "journal_entries";
    pub const NEWSLETTER_SUBSCRIBERS: &str = "newsletter_subscribers";
    /// Server-side OAuth sessions (keyed by session id)
    pub const SESSIONS: &str = "sessions";
}
