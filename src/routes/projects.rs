use axum::Json;
use tracing::{debug, instrument};

use crate::{auth::CurrentUser, response::Envelope};

#[instrument(skip_all)]
pub async fn list_projects(current: CurrentUser) -> Json<Envelope<()>> {
    debug!(user_id = %current.user.id, "projects requested");
    Json(Envelope::message("Projects endpoint"))
}
