// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Habit model and the streak rules that govern it.
//!
//! A habit owns an append-only completion history. Check-ins are limited
//! to one per local calendar day; the streak counts consecutive-day
//! completions and is derived only from the entry immediately preceding
//! the newest one. `completed_today` is a cached flag, lazily reset when
//! habits are listed on a later day.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::time_utils::{day_key, local_day};

/// One completion record. History is append-only and never deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    pub completed: bool,
}

/// Habit stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    /// UUID, also used as the document ID
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub color: String,
    pub streak: u32,
    pub completed_today: bool,
    pub last_checked_date: Option<DateTime<Utc>>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_CATEGORY: &str = "General";
pub const DEFAULT_COLOR: &str = "bg-primary";
/// Shown in API responses when a habit has no description of its own.
pub const DEFAULT_DESCRIPTION: &str = "Daily goal";

impl Habit {
    pub fn new(
        owner_id: String,
        title: String,
        description: Option<String>,
        category: Option<String>,
        color: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id,
            title,
            description,
            category: category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            color: color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            streak: 0,
            completed_today: false,
            last_checked_date: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether any history entry marks a completion on the given day.
    pub fn completed_on(&self, day: NaiveDate) -> bool {
        self.history
            .iter()
            .any(|entry| entry.completed && local_day(entry.date) == day)
    }

    /// Apply a check-in at `now`.
    ///
    /// Returns `false` without changing anything when the habit is
    /// already completed on `now`'s calendar day. Otherwise appends a
    /// completion and updates the streak: incremented when the entry
    /// before the new one falls on yesterday, reset to 1 in every other
    /// case. Only that single preceding entry is consulted; earlier
    /// history never retroactively changes a streak.
    pub fn apply_check_in(&mut self, now: DateTime<Utc>) -> bool {
        let today = local_day(now);
        if self.completed_on(today) {
            return false;
        }

        self.history.push(HistoryEntry {
            date: now,
            completed: true,
        });

        let previous = self
            .history
            .len()
            .checked_sub(2)
            .and_then(|i| self.history.get(i));

        self.streak = match previous {
            Some(entry) if local_day(entry.date).succ_opt() == Some(today) => self.streak + 1,
            _ => 1,
        };

        self.completed_today = true;
        self.last_checked_date = Some(now);
        self.updated_at = now;
        true
    }

    /// Lazily reconcile the cached `completed_today` flag against the
    /// current day. Returns `true` when the flag actually flipped and
    /// the habit needs persisting. Streak and history are untouched.
    pub fn reconcile_daily_flag(&mut self, today: NaiveDate) -> bool {
        match self.last_checked_date {
            Some(checked) if self.completed_today && local_day(checked) != today => {
                self.completed_today = false;
                true
            }
            _ => false,
        }
    }
}

/// Per-(habit, day) check-in marker.
///
/// Written with a create-only insert, so of two concurrent check-ins on
/// the same day exactly one creates the marker and the other fails at
/// the store. The document id embeds the day, making it the uniqueness
/// key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitCheckIn {
    /// `{habit_id}_{YYYY-MM-DD}`, also used as the document ID
    pub id: String,
    pub habit_id: String,
    pub owner_id: String,
    /// `YYYY-MM-DD` in server-local time
    pub day: String,
    pub checked_at: DateTime<Utc>,
}

impl HabitCheckIn {
    pub fn new(habit: &Habit, day: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("{}_{}", habit.id, day_key(day)),
            habit_id: habit.id.clone(),
            owner_id: habit.owner_id.clone(),
            day: day_key(day),
            checked_at: now,
        }
    }
}

/// Habit as returned by the API. Identical to the stored shape except
/// that an absent description is replaced with a friendly default.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub color: String,
    pub streak: u32,
    pub completed_today: bool,
    pub last_checked_date: Option<DateTime<Utc>>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
}

impl From<&Habit> for HabitView {
    fn from(habit: &Habit) -> Self {
        let description = match habit.description.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => DEFAULT_DESCRIPTION.to_string(),
        };

        Self {
            id: habit.id.clone(),
            title: habit.title.clone(),
            description,
            category: habit.category.clone(),
            color: habit.color.clone(),
            streak: habit.streak,
            completed_today: habit.completed_today,
            last_checked_date: habit.last_checked_date,
            history: habit.history.clone(),
            created_at: habit.created_at,
        }
    }
}
