//! Credential workflow orchestrator.
//!
//! Composes the password hasher, the session signer and the confirmation
//! signer over the record store and the mailer. Each operation maps its
//! collaborators' failures into the caller-visible [`AuthError`] taxonomy
//! before returning; nothing here panics on bad input.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::confirm::Purpose;
use crate::auth::dto::{PublicUser, RegisterRequest, SessionResponse};
use crate::auth::password::{hash_password, verify_password};
use crate::error::AuthError;
use crate::mail::{reset_email, verification_email, Mailer};
use crate::state::AppState;
use crate::store::{StoreError, UserPatch, UserRecord};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn map_store(e: StoreError) -> AuthError {
    match e {
        StoreError::UniqueViolation => AuthError::DuplicateEmail,
        StoreError::NotFound => AuthError::NotFound,
        StoreError::Backend(msg) => AuthError::Store(msg),
    }
}

/// Spawn the delivery so the triggering request never waits on SMTP.
/// Failures are logged on the task's own path and surface nowhere else.
fn dispatch_email(mailer: Arc<dyn Mailer>, to: String, subject: String, body: String) {
    tokio::spawn(async move {
        if let Err(e) = mailer.send(&to, &subject, &body).await {
            warn!(error = %e, %to, "email delivery failed");
        }
    });
}

/// Create an unverified account and dispatch the verification mail.
///
/// The mail is best-effort: a delivery failure does not roll the account
/// back. The response carries neither the hash nor the token.
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<PublicUser, AuthError> {
    let email = req.email.trim().to_string();

    if !is_valid_email(&email) {
        return Err(AuthError::Validation("invalid email address".into()));
    }
    if req.password.len() < 8 {
        return Err(AuthError::Validation("password too short".into()));
    }

    // Exact-match existence check; the store's uniqueness constraint is the
    // backstop for the race between this check and the insert.
    if state.store.find(&email).await.map_err(map_store)?.is_some() {
        warn!(%email, "registration with taken email");
        return Err(AuthError::DuplicateEmail);
    }

    let hash = hash_password(&req.password)?;
    let record = UserRecord::new(email.clone(), req.full_name, hash);
    let public = PublicUser::from(record.clone());
    state.store.insert(record).await.map_err(map_store)?;

    let token = state.confirm.issue(&email, Purpose::VerifyEmail);
    let (subject, body) = verification_email(&state.config.public_base_url, &token);
    dispatch_email(state.mailer.clone(), email.clone(), subject, body);

    if let Err(e) = state.store.append_activity(&email, "registered").await {
        warn!(error = %e, %email, "activity append failed");
    }

    info!(%email, "user registered");
    Ok(public)
}

/// Verify credentials and issue a session token.
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<SessionResponse, AuthError> {
    let email = email.trim();
    let record = match state.store.find(email).await.map_err(map_store)? {
        Some(r) => r,
        None => {
            warn!(%email, "login with unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    if !verify_password(password, &record.password_hash) {
        warn!(%email, "login with wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    if !record.is_verified {
        return Err(AuthError::EmailNotVerified);
    }

    let token = state.session.sign(email)?;
    if let Err(e) = state.store.append_activity(email, "login").await {
        warn!(error = %e, %email, "activity append failed");
    }

    info!(%email, "user logged in");
    Ok(SessionResponse::bearer(token))
}

/// Consume a verify-email token and flip the account to verified.
/// One-way: a verified account stays verified.
pub async fn verify_email(state: &AppState, token: &str) -> Result<PublicUser, AuthError> {
    let email = state
        .confirm
        .validate(token, Purpose::VerifyEmail, state.confirm.max_age())?;

    // The record may have been deleted between issuance and use.
    if state.store.find(&email).await.map_err(map_store)?.is_none() {
        return Err(AuthError::NotFound);
    }

    state
        .store
        .update(&email, UserPatch::verified())
        .await
        .map_err(map_store)?;
    if let Err(e) = state.store.append_activity(&email, "email_verified").await {
        warn!(error = %e, %email, "activity append failed");
    }

    info!(%email, "email verified");
    let record = state
        .store
        .find(&email)
        .await
        .map_err(map_store)?
        .ok_or(AuthError::NotFound)?;
    Ok(PublicUser::from(record))
}

/// Issue a reset-password token and dispatch the reset mail.
///
/// Returns `NotFound` for unknown emails, mirroring the original service.
/// That leaks account existence; recorded as a policy decision.
pub async fn request_password_reset(state: &AppState, email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if state.store.find(email).await.map_err(map_store)?.is_none() {
        return Err(AuthError::NotFound);
    }

    let token = state.confirm.issue(email, Purpose::ResetPassword);
    let (subject, body) = reset_email(&state.config.public_base_url, &token);
    dispatch_email(state.mailer.clone(), email.to_string(), subject, body);

    info!(%email, "password reset requested");
    Ok(())
}

/// Consume a reset-password token and overwrite the stored hash.
pub async fn reset_password(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    let email = state
        .confirm
        .validate(token, Purpose::ResetPassword, state.confirm.max_age())?;

    if new_password.len() < 8 {
        return Err(AuthError::Validation("password too short".into()));
    }

    if state.store.find(&email).await.map_err(map_store)?.is_none() {
        return Err(AuthError::NotFound);
    }

    let hash = hash_password(new_password)?;
    state
        .store
        .update(&email, UserPatch::password_hash(hash))
        .await
        .map_err(map_store)?;
    if let Err(e) = state.store.append_activity(&email, "password_reset").await {
        warn!(error = %e, %email, "activity append failed");
    }

    info!(%email, "password reset");
    Ok(())
}

/// Authenticated password change: the caller proves the session and the
/// current password before the hash is overwritten.
pub async fn change_password(
    state: &AppState,
    session_token: &str,
    old_password: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    let record = resolve_session(state, session_token).await?;

    if !verify_password(old_password, &record.password_hash) {
        warn!(email = %record.email, "password change with wrong current password");
        return Err(AuthError::InvalidCredentials);
    }
    if new_password.len() < 8 {
        return Err(AuthError::Validation("password too short".into()));
    }

    let hash = hash_password(new_password)?;
    state
        .store
        .update(&record.email, UserPatch::password_hash(hash))
        .await
        .map_err(map_store)?;
    if let Err(e) = state
        .store
        .append_activity(&record.email, "password_changed")
        .await
    {
        warn!(error = %e, email = %record.email, "activity append failed");
    }

    info!(email = %record.email, "password changed");
    Ok(())
}

/// Resolve a session token to the caller's public profile.
pub async fn current_user(state: &AppState, session_token: &str) -> Result<PublicUser, AuthError> {
    let record = resolve_session(state, session_token).await?;
    Ok(PublicUser::from(record))
}

/// Delete the authenticated caller's account.
pub async fn delete_account(state: &AppState, session_token: &str) -> Result<(), AuthError> {
    let record = resolve_session(state, session_token).await?;
    state.store.delete(&record.email).await.map_err(map_store)?;
    info!(email = %record.email, "account deleted");
    Ok(())
}

/// Session token to user record. Any token failure or a missing record is
/// `Unauthorized`; the caller learns nothing finer.
async fn resolve_session(state: &AppState, token: &str) -> Result<UserRecord, AuthError> {
    let claims = state.session.validate(token).map_err(|e| {
        tracing::debug!(cause = %e, "session rejected");
        AuthError::Unauthorized
    })?;
    state
        .store
        .find(&claims.sub)
        .await
        .map_err(map_store)?
        .ok_or(AuthError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("spaces in@x.com"));
    }
}
