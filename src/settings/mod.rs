use axum::{routing::get, Router};

use crate::state::AppState;

mod dto;
pub mod handlers;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/settings",
        get(handlers::get_settings).put(handlers::update_settings),
    )
}
