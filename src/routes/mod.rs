use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod admin;
pub mod ai;
pub mod health;
pub mod projects;

/// Everything under `/api` that is not auth or settings.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/projects", get(projects::list_projects))
        .route("/ai/generate", post(ai::generate))
        .route("/admin/stats", get(admin::stats))
}
