use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmConfig {
    pub secret: String,
    pub max_age_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub confirm: ConfirmConfig,
    /// Absent SMTP config means mail is logged and dropped (local runs, tests).
    pub smtp: Option<SmtpConfig>,
    /// Base URL embedded in verification / reset links.
    pub public_base_url: String,
}

impl AppConfig {
    /// Read configuration from the environment once at startup.
    /// Missing signing secrets are fatal.
    pub fn from_env() -> anyhow::Result<Self> {
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "credence".into()),
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
        };
        let confirm = ConfirmConfig {
            secret: std::env::var("CONFIRM_SECRET").context("CONFIRM_SECRET must be set")?,
            max_age_secs: std::env::var("CONFIRM_MAX_AGE_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(3600),
        };
        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(587),
                username: std::env::var("SMTP_USERNAME").context("SMTP_USERNAME must be set")?,
                password: std::env::var("SMTP_PASSWORD").context("SMTP_PASSWORD must be set")?,
                from: std::env::var("MAIL_FROM").context("MAIL_FROM must be set")?,
            }),
            Err(_) => None,
        };
        let public_base_url =
            std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into());

        Ok(Self {
            session,
            confirm,
            smtp,
            public_base_url,
        })
    }
}
