use axum::{extract::State, Json};
use tracing::{info, instrument, warn};

use super::dto::{merged_settings, SettingsData, SettingsUpdate};
use crate::{
    auth::{handlers::EMAIL_IN_USE, CurrentUser},
    error::AppError,
    response::Envelope,
    state::AppState,
    users::{is_duplicate_email, ProfileUpdate},
    validation::{normalize_email, ValidatedJson},
};

#[instrument(skip_all)]
pub async fn get_settings(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Envelope<SettingsData>>, AppError> {
    let user = state
        .users
        .find_by_id(current.user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let settings = merged_settings(&user.name, &user.email, user.settings.as_deref());
    Ok(Json(Envelope::data(SettingsData { settings })))
}

#[instrument(skip_all)]
pub async fn update_settings(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedJson(payload): ValidatedJson<SettingsUpdate>,
) -> Result<Json<Envelope<SettingsData>>, AppError> {
    let user_id = current.user.id;
    let email = payload.email.as_deref().map(normalize_email);

    if let Some(email) = &email {
        if let Some(owner) = state.users.find_by_email(email).await? {
            if owner.id != user_id {
                warn!(user_id = %user_id, "settings update with an email owned by another user");
                return Err(AppError::Conflict(EMAIL_IN_USE.into()));
            }
        }
    }

    let update = ProfileUpdate {
        name: payload.name.map(|n| n.trim().to_string()),
        email,
        settings: Some(serde_json::to_string(&payload.preferences)?),
    };
    let user = match state.users.update_profile(user_id, update).await {
        Ok(user) => user,
        Err(e) if is_duplicate_email(&e) => {
            warn!(user_id = %user_id, "settings update lost a race for the same email");
            return Err(AppError::Conflict(EMAIL_IN_USE.into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, "settings updated");
    let settings = merged_settings(&user.name, &user.email, user.settings.as_deref());
    Ok(Json(Envelope::data(SettingsData { settings })))
}
