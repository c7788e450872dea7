use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::debug;

use crate::users::repo::User;

/// Short-lived memo of the user behind an access token, keyed by email.
///
/// Entries live for `ttl` no matter how long the token itself is valid, and
/// are dropped eagerly whenever the user row changes.
pub struct UserCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (User, Instant)>>,
}

impl UserCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, email: &str) -> Option<User> {
        self.get_at(email, Instant::now())
    }

    fn get_at(&self, email: &str, now: Instant) -> Option<User> {
        let mut entries = self.entries.lock();
        match entries.get(email) {
            Some((user, expires)) if *expires > now => Some(user.clone()),
            Some(_) => {
                entries.remove(email);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, user: User) {
        self.insert_at(user, Instant::now());
    }

    fn insert_at(&self, user: User, now: Instant) {
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(user.email.clone(), (user, now + self.ttl));
    }

    pub fn invalidate(&self, email: &str) {
        if self.entries.lock().remove(email).is_some() {
            debug!("user cache entry evicted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: "someone".into(),
            email: email.into(),
            password_hash: "x".into(),
            avatar: None,
            confirmed: true,
            refresh_token: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn returns_entry_within_ttl() {
        let cache = UserCache::new(Duration::from_secs(60));
        cache.insert(user("ann@example.com"));
        assert_eq!(cache.get("ann@example.com").unwrap().email, "ann@example.com");
        assert!(cache.get("bob@example.com").is_none());
    }

    #[test]
    fn entry_expires_after_ttl() {
        let cache = UserCache::new(Duration::from_secs(60));
        let start = Instant::now();
        cache.insert_at(user("ann@example.com"), start);
        assert!(cache.get_at("ann@example.com", start + Duration::from_secs(59)).is_some());
        assert!(cache.get_at("ann@example.com", start + Duration::from_secs(61)).is_none());
    }

    #[test]
    fn invalidate_drops_entry() {
        let cache = UserCache::new(Duration::from_secs(60));
        cache.insert(user("ann@example.com"));
        cache.invalidate("ann@example.com");
        assert!(cache.get("ann@example.com").is_none());
    }

    #[test]
    fn insert_prunes_expired_entries() {
        let cache = UserCache::new(Duration::from_secs(10));
        let start = Instant::now();
        cache.insert_at(user("old@example.com"), start);
        cache.insert_at(user("new@example.com"), start + Duration::from_secs(20));
        assert_eq!(cache.entries.lock().len(), 1);
    }
}
