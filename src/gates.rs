//! Gate checks evaluated strictly before the pipeline runs
//!
//! Two pass/fail gates: a sliding-window rate limiter keyed by client, and
//! a bot-challenge token check. On fail the pipeline is never invoked.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

const DEFAULT_LIMIT: u32 = 30;
const DEFAULT_WINDOW_SECS: u64 = 60;

/// Sliding-window rate limiter. The only shared mutable state in the
/// service; per-request pipeline state is all stack-local.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    hits: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build from SUPPORT_RATE_LIMIT / SUPPORT_RATE_WINDOW_SECS.
    pub fn from_env() -> Self {
        let limit = std::env::var("SUPPORT_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_LIMIT);
        let window_secs = std::env::var("SUPPORT_RATE_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_WINDOW_SECS);
        Self::new(limit, Duration::from_secs(window_secs))
    }

    /// Record one request for `client_key`; true when within the limit.
    pub async fn check(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.write().await;

        // Client keys derive from caller-controlled headers, so entries
        // whose windows have fully expired must be dropped or rotating
        // keys grows the map for the life of the process.
        hits.retain(|_, window_hits| {
            window_hits.retain(|t| now.duration_since(*t) < self.window);
            !window_hits.is_empty()
        });

        let window_hits = hits.entry(client_key.to_string()).or_default();

        if window_hits.len() as u32 >= self.limit {
            warn!(client = %client_key, "rate limit exceeded");
            return false;
        }

        window_hits.push(now);
        true
    }

    /// Number of clients with activity inside the current window.
    pub async fn tracked_clients(&self) -> usize {
        self.hits.read().await.len()
    }
}

/// Verify the bot-challenge token. With no expected token configured the
/// gate is a pass-through (local development).
pub fn verify_challenge(token: Option<&str>) -> bool {
    match std::env::var("SUPPORT_CHALLENGE_TOKEN") {
        Ok(expected) if !expected.is_empty() => token == Some(expected.as_str()),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_allows_within_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("client-a").await);
        assert!(limiter.check("client-a").await);
        assert!(limiter.check("client-a").await);
        assert!(!limiter.check("client-a").await);
    }

    #[tokio::test]
    async fn test_rate_limiter_is_per_client() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("client-a").await);
        assert!(limiter.check("client-b").await);
        assert!(!limiter.check("client-a").await);
    }

    #[test]
    fn test_rate_limiter_without_runtime() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(tokio_test::block_on(limiter.check("cli")));
        assert!(tokio_test::block_on(limiter.check("cli")));
        assert!(!tokio_test::block_on(limiter.check("cli")));
    }

    #[tokio::test]
    async fn test_rate_limiter_window_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("client-a").await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.check("client-a").await);
    }

    #[tokio::test]
    async fn test_stale_client_keys_are_evicted() {
        let limiter = RateLimiter::new(5, Duration::from_millis(20));

        // Rotating keys, as an abusive caller cycling header values would.
        for key in ["rot-1", "rot-2", "rot-3", "rot-4"] {
            assert!(limiter.check(key).await);
        }
        assert_eq!(limiter.tracked_clients().await, 4);

        tokio::time::sleep(Duration::from_millis(40)).await;

        // The next check sweeps every expired entry, not just its own key.
        assert!(limiter.check("fresh").await);
        assert_eq!(limiter.tracked_clients().await, 1);
    }
}
