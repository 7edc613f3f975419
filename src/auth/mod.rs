use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod extractors;
mod handlers;
pub mod jwt;
pub mod password;

pub use extractors::{AuthUser, Viewer};

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
