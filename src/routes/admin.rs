use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{auth::AdminUser, error::AppError, response::Envelope, state::AppState};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub users: i64,
    pub active_sessions: usize,
}

#[instrument(skip_all)]
pub async fn stats(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<Json<Envelope<Stats>>, AppError> {
    debug!(admin_id = %admin.0.user.id, "stats requested");
    let users = state.users.count().await?;
    let active_sessions = state.sessions.active_count().await;
    Ok(Json(Envelope::data(Stats {
        users,
        active_sessions,
    })))
}
