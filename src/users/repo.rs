use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub avatar: Option<String>,
    pub confirmed: bool,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
}

/// Raised by `UserStore::create` when the email is already registered.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct EmailTaken;

/// Data access for users. Emails are expected already normalized.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, new: NewUser) -> anyhow::Result<User>;
    async fn set_refresh_token(&self, user_id: Uuid, token: Option<&str>) -> anyhow::Result<()>;
    /// Replaces the stored refresh token only if it still equals `current`.
    /// Returns whether the swap happened.
    async fn rotate_refresh_token(&self, user_id: Uuid, current: &str, next: &str) -> anyhow::Result<bool>;
    async fn mark_confirmed(&self, email: &str) -> anyhow::Result<()>;
    async fn set_avatar(&self, email: &str, url: &str) -> anyhow::Result<Option<User>>;
    async fn set_password(&self, email: &str, password_hash: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, avatar, confirmed, refresh_token, created_at";

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select user by email")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, avatar)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.avatar)
        .fetch_one(&self.db)
        .await;
        match user {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(EmailTaken.into()),
            Err(e) => Err(anyhow::Error::new(e).context("insert user")),
        }
    }

    async fn set_refresh_token(&self, user_id: Uuid, token: Option<&str>) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(user_id)
            .bind(token)
            .execute(&self.db)
            .await
            .context("update refresh token")?;
        Ok(())
    }

    async fn rotate_refresh_token(&self, user_id: Uuid, current: &str, next: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE users SET refresh_token = $3 WHERE id = $1 AND refresh_token = $2")
            .bind(user_id)
            .bind(current)
            .bind(next)
            .execute(&self.db)
            .await
            .context("rotate refresh token")?;
        Ok(res.rows_affected() == 1)
    }

    async fn mark_confirmed(&self, email: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET confirmed = TRUE WHERE email = $1")
            .bind(email)
            .execute(&self.db)
            .await
            .context("confirm email")?;
        Ok(())
    }

    async fn set_avatar(&self, email: &str, url: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $2 WHERE email = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(url)
        .fetch_optional(&self.db)
        .await
        .context("update avatar")?;
        Ok(user)
    }

    async fn set_password(&self, email: &str, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE email = $1")
            .bind(email)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("update password")?;
        Ok(())
    }
}
