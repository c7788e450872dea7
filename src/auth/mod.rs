use crate::state::AppState;
use axum::Router;

pub mod cache;
pub mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod mail;
pub mod password;

pub use dto::is_valid_email;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
