use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use tracing::warn;

use crate::error::ApiError;

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter per key.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

/// Outcome of a rejected request: seconds until the window resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exceeded {
    pub retry_after: Duration,
}

const PRUNE_THRESHOLD: usize = 10_000;

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(&self, key: &str) -> Result<(), Exceeded> {
        self.check_at(key, Instant::now())
    }

    /// Counts one request for `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), Exceeded> {
        let mut windows = self.windows.lock();
        if windows.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let w = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(w.started) >= self.window {
            w.started = now;
            w.count = 0;
        }
        if w.count >= self.max_requests {
            let elapsed = now.duration_since(w.started);
            return Err(Exceeded {
                retry_after: self.window.saturating_sub(elapsed),
            });
        }
        w.count += 1;
        Ok(())
    }
}

fn client_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

/// Route middleware: one budget per route and client address.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let client = client_key(&req);
    let key = format!("{} {}|{}", req.method(), route, client);

    if let Err(exceeded) = limiter.check(&key) {
        warn!(%client, %route, "rate limit exceeded");
        return Err(ApiError::TooManyRequests {
            limit: limiter.max_requests(),
            window_secs: limiter.window().as_secs(),
            retry_after_secs: exceeded.retry_after.as_secs().max(1),
        });
    }
    Ok(next.run(req).await)
}
