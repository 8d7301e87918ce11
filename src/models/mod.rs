// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod habit;
pub mod journal;
pub mod newsletter;
pub mod session;
pub mod user;

pub use habit::{Habit, HabitCheckIn, HabitView, HistoryEntry};
pub use journal::JournalEntry;
pub use newsletter::Subscriber;
pub use session::Session;
pub use user::{AuthProvider, User, UserView};
