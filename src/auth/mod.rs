use crate::state::AppState;
use axum::Router;

pub mod confirm;
pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod password;
pub mod service;
pub mod session;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
