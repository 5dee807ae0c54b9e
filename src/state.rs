use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::confirm::ConfirmSigner;
use crate::auth::session::SessionKeys;
use crate::config::AppConfig;
use crate::mail::{Mailer, NullMailer, SmtpMailer};
use crate::store::{InMemoryStore, UserStore};

/// Process-wide state. Built once at startup; the signing material is
/// read-only afterwards, the store and mailer are shared trait objects.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
    pub session: SessionKeys,
    pub confirm: ConfirmSigner,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                tracing::warn!("SMTP_HOST not set, outbound mail will be dropped");
                Arc::new(NullMailer)
            }
        };
        Ok(Self::from_parts(
            config,
            Arc::new(InMemoryStore::new()),
            mailer,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let session = SessionKeys::new(&config.session);
        let confirm = ConfirmSigner::new(&config.confirm);
        Self {
            config,
            store,
            mailer,
            session,
            confirm,
        }
    }

    /// State wired to an in-memory store and the given mailer, for tests.
    pub fn for_tests(store: Arc<dyn UserStore>, mailer: Arc<dyn Mailer>) -> Self {
        let config = Arc::new(AppConfig {
            session: crate::config::SessionConfig {
                secret: "test-session-secret".into(),
                issuer: "test".into(),
                ttl_minutes: 30,
            },
            confirm: crate::config::ConfirmConfig {
                secret: "test-confirm-secret".into(),
                max_age_secs: 3600,
            },
            smtp: None,
            public_base_url: "http://localhost:8080".into(),
        });
        Self::from_parts(config, store, mailer)
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        state.session.clone()
    }
}
