use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    pub email_ttl_hours: i64,
    pub reset_ttl_minutes: i64,
}

/// Requests allowed per window, one ceiling per route group.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub contacts: u32,
    pub auth: u32,
    pub users: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub user_cache_ttl_secs: u64,
    pub cors_origins: Vec<String>,
    pub public_base_url: String,
    pub mail_from: String,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: env_or("JWT_ISSUER", "contactbook"),
            audience: env_or("JWT_AUDIENCE", "contactbook-users"),
            ttl_minutes: env_parse("JWT_ACCESS_TTL_MINUTES", 15),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 7),
            email_ttl_hours: env_parse("JWT_EMAIL_TTL_HOURS", 24 * 7),
            reset_ttl_minutes: env_parse("JWT_RESET_TTL_MINUTES", 60),
        };
        let rate_limit = RateLimitConfig {
            contacts: env_parse("RATE_LIMIT_CONTACTS", 10),
            auth: env_parse("RATE_LIMIT_AUTH", 5),
            users: env_parse("RATE_LIMIT_USERS", 10),
            window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", 60),
        };
        let storage = StorageConfig {
            endpoint: env_or("S3_ENDPOINT", "http://localhost:9000"),
            bucket: env_or("S3_BUCKET", "avatars"),
            access_key: env_or("S3_ACCESS_KEY", "minioadmin"),
            secret_key: env_or("S3_SECRET_KEY", "minioadmin"),
            region: env_or("S3_REGION", "us-east-1"),
            public_url: env_or("S3_PUBLIC_URL", "http://localhost:9000"),
        };
        Ok(Self {
            database_url,
            jwt,
            rate_limit,
            user_cache_ttl_secs: env_parse("USER_CACHE_TTL_SECS", 15 * 60),
            cors_origins: parse_list(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:8080"),
            mail_from: env_or("MAIL_FROM", "no-reply@contactbook.local"),
            storage,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
