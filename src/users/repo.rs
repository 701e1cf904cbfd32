use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewUser, ProfileUpdate, User, UserRow};

/// Unique index on `users.email`.
const EMAIL_CONSTRAINT: &str = "users_email_key";

/// The email belongs to another account.
#[derive(Debug, thiserror::Error)]
#[error("email already registered: {0}")]
pub struct DuplicateEmail(pub String);

pub fn is_duplicate_email(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DuplicateEmail>().is_some()
}

/// Persistent user storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Expects an already normalized email.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Only returns a user whose token expires strictly after `now`.
    async fn find_by_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>>;

    /// Fails with [`DuplicateEmail`] when the email is taken.
    async fn create(&self, new_user: NewUser) -> anyhow::Result<User>;

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: Option<&str>,
        expires: Option<OffsetDateTime>,
    ) -> anyhow::Result<()>;

    /// Sets the password through a live reset token and clears the token in
    /// the same step. `None` when the token is unknown, expired or spent.
    async fn redeem_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>>;

    /// Fails with [`DuplicateEmail`] when the new email is taken.
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> anyhow::Result<User>;

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;

    async fn count(&self) -> anyhow::Result<i64>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, reset_token, reset_token_expires, \
                            role, avatar_url, settings, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row.map(User::from))
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1 AND reset_token_expires > $2"
        ))
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("find user by reset token")?;
        Ok(row.map(User::from))
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_email_error(e, &new_user.email, "insert user"))?;
        Ok(row.into())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: Option<&str>,
        expires: Option<OffsetDateTime>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_token = $2, reset_token_expires = $3, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(expires)
        .execute(&self.db)
        .await
        .context("set reset token")?;
        Ok(())
    }

    async fn redeem_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET password_hash = $3, reset_token = NULL, reset_token_expires = NULL,
                   updated_at = now()
             WHERE reset_token = $1 AND reset_token_expires > $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(token)
        .bind(now)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await
        .context("redeem reset token")?;
        Ok(row.map(User::from))
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> anyhow::Result<User> {
        let email = update.email.clone().unwrap_or_default();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   settings = COALESCE($4, settings),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.email)
        .bind(update.settings)
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_email_error(e, &email, "update profile"))?;
        Ok(row.into())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .context("count users")?;
        Ok(count)
    }
}

fn unique_email_error(err: sqlx::Error, email: &str, action: &'static str) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db) if db.constraint() == Some(EMAIL_CONSTRAINT) => {
            DuplicateEmail(email.to_string()).into()
        }
        _ => anyhow::Error::new(err).context(action),
    }
}
