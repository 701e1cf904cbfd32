//! Process-local [`UserStore`] used when no database is configured, and by tests.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo::{DuplicateEmail, UserStore},
    repo_types::{NewUser, ProfileUpdate, User},
};

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| {
                u.reset_token.as_deref() == Some(token)
                    && u.reset_token_expires.map_or(false, |exp| exp > now)
            })
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new_user.email) {
            return Err(DuplicateEmail(new_user.email).into());
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            reset_token: None,
            reset_token_expires: None,
            role: new_user.role,
            avatar_url: None,
            settings: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: Option<&str>,
        expires: Option<OffsetDateTime>,
    ) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("user {} not found", id))?;
        user.reset_token = token.map(str::to_string);
        user.reset_token_expires = expires;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn redeem_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.write().await;
        let Some(user) = users.values_mut().find(|u| {
            u.reset_token.as_deref() == Some(token)
                && u.reset_token_expires.map_or(false, |exp| exp > now)
        }) else {
            return Ok(None);
        };
        user.password_hash = password_hash.to_string();
        user.reset_token = None;
        user.reset_token_expires = None;
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> anyhow::Result<User> {
        let mut users = self.users.write().await;
        if let Some(email) = &update.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(DuplicateEmail(email.clone()).into());
            }
        }
        let user = users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("user {} not found", id))?;
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(settings) = update.settings {
            user.settings = Some(settings);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn count(&self) -> anyhow::Result<i64> {
        Ok(self.users.read().await.len() as i64)
    }
}
