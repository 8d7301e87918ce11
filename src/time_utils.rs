// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for calendar-day arithmetic.
//!
//! Streak and daily-reset rules compare calendar days in the server's
//! local timezone, not rolling 24-hour windows. Two timestamps belong to
//! the same day exactly when they land on the same local date.

use chrono::{DateTime, Local, NaiveDate, Utc};

/// The local calendar day a UTC instant falls on.
pub fn local_day(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

/// The current local calendar day.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Canonical `YYYY-MM-DD` key for a calendar day, used in document ids.
pub fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
