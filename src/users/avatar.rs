use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};

/// Looks up a default avatar for a freshly registered email.
#[async_trait]
pub trait AvatarProvider: Send + Sync {
    async fn lookup(&self, email: &str) -> anyhow::Result<Option<String>>;
}

pub struct Gravatar {
    client: reqwest::Client,
    base_url: String,
}

impl Gravatar {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .context("build gravatar http client")?;
        Ok(Self {
            client,
            base_url: "https://www.gravatar.com/avatar".into(),
        })
    }
}

/// Gravatar profile hash: SHA-256 of the trimmed, lowercased address.
pub fn gravatar_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

#[async_trait]
impl AvatarProvider for Gravatar {
    async fn lookup(&self, email: &str) -> anyhow::Result<Option<String>> {
        let url = format!("{}/{}", self.base_url, gravatar_hash(email));
        let res = self
            .client
            .head(&url)
            .query(&[("d", "404")])
            .send()
            .await
            .context("gravatar lookup")?;
        match res.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(url)),
            s => anyhow::bail!("gravatar answered {}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_case_and_whitespace() {
        assert_eq!(gravatar_hash(" Ann@Example.com "), gravatar_hash("ann@example.com"));
        assert_eq!(gravatar_hash("ann@example.com").len(), 64);
    }
}
