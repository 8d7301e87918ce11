// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SMTP delivery behind an optional transport.
//!
//! When SMTP credentials are absent from the environment the mailer
//! still constructs, but drops every message with a debug log. That
//! keeps local development and tests from needing a relay.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct Mailer {
    inner: Option<MailerInner>,
}

#[derive(Clone)]
struct MailerInner {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: Option<&SmtpConfig>) -> anyhow::Result<Self> {
        let Some(config) = config else {
            return Ok(Self::disabled());
        };
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        let from = config.from.parse::<Mailbox>()?;
        Ok(Self {
            inner: Some(MailerInner { transport, from }),
        })
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Send an HTML email. A no-op (with a log line) when no transport
    /// is configured.
    pub async fn send(&self, to: &str, subject: &str, html_body: String) -> Result<(), AppError> {
        let Some(inner) = &self.inner else {
            tracing::debug!(to, subject, "Mail transport not configured; dropping message");
            return Ok(());
        };

        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid recipient address: {}", e)))?;
        let message = Message::builder()
            .from(inner.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build email: {}", e)))?;

        inner
            .transport
            .send(message)
            .await
            .map_err(|e| AppError::Upstream(format!("SMTP send failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_mailer_drops_silently() {
        let mailer = Mailer::disabled();
        assert!(!mailer.is_enabled());
        mailer
            .send("anyone@example.com", "Hello", "<p>hi</p>".to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected_before_send() {
        let config = SmtpConfig {
            host: "localhost".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
            from: "HabitMate <noreply@example.com>".to_string(),
        };
        let mailer = Mailer::from_config(Some(&config)).unwrap();
        assert!(mailer.is_enabled());
        let err = mailer
            .send("not an address", "Hello", "<p>hi</p>".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
