use crate::state::AppState;
use axum::Router;

pub mod cookie;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod password;
pub mod services;
pub mod session;

pub use extractors::{AdminUser, CurrentUser};
pub use session::SessionStore;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
