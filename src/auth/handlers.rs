//! Thin HTTP glue over the credential workflows.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::dto::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MessageResponse, PublicUser,
    RegisterRequest, ResetPasswordRequest, SessionResponse, VerifyEmailQuery,
};
use crate::auth::extractors::AuthSession;
use crate::auth::service;
use crate::error::AuthError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-email", get(verify_email))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/change-password", post(change_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me).delete(delete_me))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AuthError> {
    let user = service::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AuthError> {
    let session = service::login(&state, &payload.email, &payload.password).await?;
    Ok(Json(session))
}

#[instrument(skip(state, query))]
async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<PublicUser>, AuthError> {
    let user = service::verify_email(&state, &query.token).await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    service::request_password_reset(&state, &payload.email).await?;
    Ok(Json(MessageResponse::new(
        "a reset link has been sent to your email address",
    )))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    service::reset_password(&state, &payload.token, &payload.new_password).await?;
    Ok(Json(MessageResponse::new("password has been reset")))
}

#[instrument(skip(state, session, payload))]
async fn change_password(
    State(state): State<AppState>,
    session: AuthSession,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    service::change_password(
        &state,
        &session.token,
        &payload.old_password,
        &payload.new_password,
    )
    .await?;
    Ok(Json(MessageResponse::new("password has been changed")))
}

#[instrument(skip(state, session))]
async fn get_me(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<PublicUser>, AuthError> {
    let user = service::current_user(&state, &session.token).await?;
    Ok(Json(user))
}

#[instrument(skip(state, session))]
async fn delete_me(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<StatusCode, AuthError> {
    service::delete_account(&state, &session.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::auth::dto::PublicUser;
    use time::OffsetDateTime;

    #[test]
    fn public_user_never_serializes_a_hash() {
        let user = PublicUser {
            email: "test@example.com".into(),
            full_name: Some("Test User".into()),
            is_verified: true,
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("password"));
        assert!(!json.contains("hash"));
    }
}
