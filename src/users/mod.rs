pub mod dto;
mod handlers;
pub mod repo;
pub mod subscriptions;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
