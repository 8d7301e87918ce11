// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, admin gating, security headers).

pub mod admin;
pub mod auth;
pub mod security;
