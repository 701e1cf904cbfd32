use tracing::info;

use super::{NewUser, Role, UserStore};
use crate::{auth::password::hash_password, config::AdminSeed, validation::normalize_email};

/// Creates the configured admin account unless its email is already registered.
/// Returns whether a user was created.
pub async fn ensure_admin(users: &dyn UserStore, seed: &AdminSeed) -> anyhow::Result<bool> {
    let email = normalize_email(&seed.email);
    if users.find_by_email(&email).await?.is_some() {
        info!(email = %email, "admin user already exists");
        return Ok(false);
    }

    let user = users
        .create(NewUser {
            name: seed.name.clone(),
            email,
            password_hash: hash_password(&seed.password)?,
            role: Role::Admin,
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, "created admin user");
    Ok(true)
}
