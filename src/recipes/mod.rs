pub mod dto;
mod handlers;
pub mod lists;
mod repo;
mod services;
pub mod shopping_list;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
