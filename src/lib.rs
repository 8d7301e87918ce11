// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! HabitMate: habit tracking with streaks, journaling and AI coaching
//!
//! This crate provides the backend API: local and OAuth authentication,
//! the habit streak engine, a daily journal, a newsletter list and a
//! proxied AI assistant.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{Assistant, AuthService, ImageHost, Mailer, OAuthClient};

/// Shared application state.
///
/// The image host and assistant are optional capabilities: absent
/// configuration disables their endpoints instead of the whole server.
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub auth: AuthService,
    pub oauth: OAuthClient,
    pub mailer: Mailer,
    pub image_host: Option<ImageHost>,
    pub assistant: Option<Assistant>,
}
