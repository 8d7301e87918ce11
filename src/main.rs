// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HabitMate API Server
//!
//! Habit tracking backend with streaks, journaling, a newsletter and an
//! AI coaching assistant, backed by Firestore.

use habitmate::{
    config::Config,
    db::Store,
    services::{Assistant, AuthService, ImageHost, Mailer, OAuthClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting HabitMate API");

    // Initialize Firestore database
    let store = Store::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    let auth = AuthService::new(store.clone(), &config);
    let oauth = OAuthClient::new();

    let mailer = Mailer::from_config(config.smtp.as_ref())
        .expect("Failed to initialize mail transport");
    if !mailer.is_enabled() {
        tracing::warn!("SMTP not configured; outgoing email disabled");
    }

    let image_host = ImageHost::from_config(config.cloudinary.as_ref());
    if image_host.is_none() {
        tracing::warn!("Cloudinary not configured; avatar uploads disabled");
    }

    let assistant = Assistant::from_config(config.deepseek_api_key.as_deref());
    if assistant.is_none() {
        tracing::warn!("DeepSeek API key not set; chat assistant disabled");
    }

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        auth,
        oauth,
        mailer,
        image_host,
        assistant,
    });

    // Build router
    let app = habitmate::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("habitmate=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
