//! Outbound email.
//!
//! Mail is best-effort from the orchestrator's point of view: messages are
//! dispatched on a spawned task and delivery failures are logged, never
//! surfaced to the triggering request.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::info;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Outbound mail capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// SMTP mailer over a pooled TLS connection.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .port(config.port)
            .pool_config(PoolConfig::new().max_size(4))
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|_| MailError::Address(self.from.clone()))?,
            )
            .to(to.parse().map_err(|_| MailError::Address(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;
        Ok(())
    }
}

/// Mailer for local runs without SMTP config: logs the message and drops it.
pub struct NullMailer;

#[async_trait]
impl Mailer for NullMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), MailError> {
        info!(%to, %subject, "mail dropped (no SMTP configured)");
        Ok(())
    }
}

/// Verification mail sent right after registration.
pub fn verification_email(base_url: &str, token: &str) -> (String, String) {
    let link = format!("{}/auth/verify-email?token={}", base_url, token);
    let body = format!(
        "Hello,\n\
         \n\
         Thanks for signing up!\n\
         Click here to verify your address: {}\n\
         \n\
         This link expires in 1 hour.\n",
        link
    );
    ("Verify your email address".to_string(), body)
}

/// Reset mail sent by the forgot-password flow.
pub fn reset_email(base_url: &str, token: &str) -> (String, String) {
    let link = format!("{}/auth/reset-password?token={}", base_url, token);
    let body = format!(
        "Hello,\n\
         \n\
         A password reset was requested for your account.\n\
         To choose a new password, follow this link: {}\n\
         \n\
         This link expires in 1 hour. If you did not request a reset,\n\
         you can ignore this email.\n",
        link
    );
    ("Reset your password".to_string(), body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_email_carries_token_in_link() {
        let (subject, body) = verification_email("http://localhost:8080", "tok123");
        assert!(subject.contains("Verify"));
        assert!(body.contains("http://localhost:8080/auth/verify-email?token=tok123"));
    }

    #[test]
    fn reset_email_carries_token_in_link() {
        let (_, body) = reset_email("https://app.example.com", "tok456");
        assert!(body.contains("https://app.example.com/auth/reset-password?token=tok456"));
    }
}
