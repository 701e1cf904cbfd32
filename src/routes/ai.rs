use axum::Json;
use tracing::{debug, instrument};

use crate::{auth::CurrentUser, response::Envelope};

// TODO: forward the prompt to a generation backend once one is chosen.
#[instrument(skip_all)]
pub async fn generate(current: CurrentUser) -> Json<Envelope<()>> {
    debug!(user_id = %current.user.id, "generation requested");
    Json(Envelope::message("AI generation endpoint"))
}
