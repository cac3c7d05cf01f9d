mod dto;
pub mod handlers;
mod repo;
pub mod status;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::task_routes())
}
