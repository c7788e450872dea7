use std::{sync::Arc, time::Duration};

use anyhow::Context;

use crate::{
    auth::{
        cache::UserCache,
        jwt::JwtKeys,
        mail::{LogMailer, Mailer},
    },
    config::{AppConfig, RateLimitConfig},
    contacts::repo::{ContactStore, PgContactStore},
    limiter::RateLimiter,
    storage::{Storage, StorageClient},
    users::{
        avatar::{AvatarProvider, Gravatar},
        repo::{PgUserStore, UserStore},
    },
};

/// Request budgets, one limiter per route group.
#[derive(Clone)]
pub struct RateLimits {
    pub contacts: Arc<RateLimiter>,
    pub auth: Arc<RateLimiter>,
    pub users: Arc<RateLimiter>,
}

impl RateLimits {
    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        let window = Duration::from_secs(cfg.window_secs);
        Self {
            contacts: Arc::new(RateLimiter::new(cfg.contacts, window)),
            auth: Arc::new(RateLimiter::new(cfg.auth, window)),
            users: Arc::new(RateLimiter::new(cfg.users, window)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub storage: Arc<dyn StorageClient>,
    pub avatars: Arc<dyn AvatarProvider>,
    pub mailer: Arc<dyn Mailer>,
    pub user_cache: Arc<UserCache>,
    pub limits: RateLimits,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        let avatars = Arc::new(Gravatar::new()?) as Arc<dyn AvatarProvider>;

        Ok(Self {
            jwt: JwtKeys::from(&config.jwt),
            users: Arc::new(PgUserStore::new(db.clone())),
            contacts: Arc::new(PgContactStore::new(db)),
            storage,
            avatars,
            mailer: Arc::new(LogMailer),
            user_cache: Arc::new(UserCache::new(Duration::from_secs(config.user_cache_ttl_secs))),
            limits: RateLimits::from_config(&config.rate_limit),
            config,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        crate::testing::fake_context().state
    }
}
