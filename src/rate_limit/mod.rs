//! Fixed-window request counters, one bucket per action class and client.
//!
//! Counters live in process memory, so the effective limit across N
//! instances is N times the configured one.

mod policy;
mod store;

pub use policy::{ActionClass, RateLimitConfig, RateLimitPolicy};
pub use store::{MemoryStore, RateLimitEntry, RateLimitStore};

use axum::http::HeaderMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::{RATE_LIMITED_TOTAL, RATE_LIMIT_ENTRIES};

pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Rate limit exceeded. Try again in {retry_after_secs} seconds.")]
pub struct RateLimitExceeded {
    pub retry_after_secs: u64,
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    policy: Arc<RateLimitPolicy>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
        }
    }

    pub fn in_memory(policy: RateLimitPolicy) -> Self {
        Self::new(Arc::new(MemoryStore::new()), policy)
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }

    /// Count a request for `identifier` under `action`'s configured limit.
    pub fn check_action(
        &self,
        action: ActionClass,
        identifier: &str,
    ) -> Result<(), RateLimitExceeded> {
        let key = format!("rate_limit:{}:{}", action.as_str(), identifier);
        let result = self.check_and_consume(&key, self.policy.config(action));
        if let Err(err) = &result {
            RATE_LIMITED_TOTAL.with_label_values(&[action.as_str()]).inc();
            debug!(
                action = %action,
                identifier,
                retry_after = err.retry_after_secs,
                "rate limited"
            );
        }
        result
    }

    pub fn check_and_consume(
        &self,
        key: &str,
        config: RateLimitConfig,
    ) -> Result<(), RateLimitExceeded> {
        self.check_and_consume_at(key, config, Instant::now())
    }

    /// Same as `check_and_consume` with an explicit clock reading.
    pub fn check_and_consume_at(
        &self,
        key: &str,
        config: RateLimitConfig,
        now: Instant,
    ) -> Result<(), RateLimitExceeded> {
        let entry = self.store.upsert(key, &mut |current| match current {
            // first request or window over: start a new window
            None => fresh_window(now, config.window),
            Some(entry) if entry.is_expired(now) => fresh_window(now, config.window),
            // rejected requests still count
            Some(entry) => RateLimitEntry {
                count: entry.count.saturating_add(1),
                ..entry
            },
        });
        RATE_LIMIT_ENTRIES.set(self.store.len() as f64);

        if entry.count > config.max_requests {
            return Err(RateLimitExceeded {
                retry_after_secs: retry_after_secs(entry.reset_time.saturating_duration_since(now)),
            });
        }
        Ok(())
    }

    pub fn sweep(&self) -> usize {
        let removed = self.store.sweep(Instant::now());
        RATE_LIMIT_ENTRIES.set(self.store.len() as f64);
        removed
    }

    /// Periodic sweep of expired entries, stopped through `shutdown`.
    pub fn spawn_sweeper(&self, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            info!("Rate limit sweeper started (interval: {:?})", every);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            debug!(removed, "swept expired rate limit entries");
                        }
                    }
                }
            }
            info!("Rate limit sweeper stopped");
        })
    }
}

fn fresh_window(now: Instant, window: Duration) -> RateLimitEntry {
    RateLimitEntry {
        count: 1,
        reset_time: now + window,
    }
}

fn retry_after_secs(remaining: Duration) -> u64 {
    remaining.as_millis().div_ceil(1000) as u64
}

/// CDN connecting IP, then real IP, then the first forwarded-for hop.
/// Unidentified clients all share the `"unknown"` bucket.
pub fn client_identifier(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    header("cf-connecting-ip")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|s| s.split(',').next())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn limiter() -> RateLimiter {
        RateLimiter::in_memory(RateLimitPolicy::default())
    }

    #[test]
    fn window_boundary() {
        let limiter = limiter();
        let config = RateLimitConfig::new(3, Duration::from_millis(1000));
        let t0 = Instant::now();

        for i in 0..3 {
            assert!(limiter
                .check_and_consume_at("k", config, t0 + Duration::from_millis(i * 10))
                .is_ok());
        }
        let err = limiter
            .check_and_consume_at("k", config, t0 + Duration::from_millis(100))
            .unwrap_err();
        assert!(err.retry_after_secs <= 1);
        assert_eq!(err.retry_after_secs, 1);

        assert!(limiter
            .check_and_consume_at("k", config, t0 + Duration::from_millis(1000))
            .is_ok());
    }

    #[test]
    fn rejected_requests_still_count() {
        let limiter = limiter();
        let config = RateLimitConfig::new(1, Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(limiter.check_and_consume_at("k", config, t0).is_ok());
        assert!(limiter.check_and_consume_at("k", config, t0).is_err());
        assert!(limiter.check_and_consume_at("k", config, t0).is_err());
        assert_eq!(limiter.store().get("k").map(|e| e.count), Some(3));
    }

    #[test]
    fn retry_after_rounds_up() {
        let limiter = limiter();
        let config = RateLimitConfig::new(1, Duration::from_secs(10));
        let t0 = Instant::now();

        limiter.check_and_consume_at("k", config, t0).unwrap();
        let err = limiter
            .check_and_consume_at("k", config, t0 + Duration::from_millis(8_500))
            .unwrap_err();
        assert_eq!(err.retry_after_secs, 2);
    }

    #[test]
    fn keys_are_isolated() {
        let limiter = limiter();
        let config = RateLimitConfig::new(2, Duration::from_secs(60));
        let t0 = Instant::now();

        for _ in 0..5 {
            let _ = limiter.check_and_consume_at("A", config, t0);
        }
        assert!(limiter.check_and_consume_at("B", config, t0).is_ok());
        assert!(limiter.check_and_consume_at("B", config, t0).is_ok());
    }

    #[test]
    fn action_classes_are_isolated() {
        let limiter = RateLimiter::in_memory(
            RateLimitPolicy::default()
                .with(ActionClass::AuthCreateLink, RateLimitConfig::new(1, Duration::from_secs(60))),
        );

        assert!(limiter.check_action(ActionClass::AuthCreateLink, "10.0.0.1").is_ok());
        assert!(limiter.check_action(ActionClass::AuthCreateLink, "10.0.0.1").is_err());
        assert!(limiter.check_action(ActionClass::AuthCreatePage, "10.0.0.1").is_ok());
    }

    #[test]
    fn identifier_header_priority() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identifier(&headers), UNKNOWN_CLIENT);

        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1, 2.2.2.2"));
        assert_eq!(client_identifier(&headers), "1.1.1.1");

        headers.insert("x-real-ip", HeaderValue::from_static("3.3.3.3"));
        assert_eq!(client_identifier(&headers), "3.3.3.3");

        headers.insert("cf-connecting-ip", HeaderValue::from_static("4.4.4.4"));
        assert_eq!(client_identifier(&headers), "4.4.4.4");
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_on_cancel() {
        let limiter = limiter();
        let token = CancellationToken::new();
        let handle = limiter.spawn_sweeper(Duration::from_secs(300), token.clone());
        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_entries() {
        let limiter = limiter();
        let now = Instant::now();
        limiter.store().set(
            "rate_limit:general_api:stale",
            RateLimitEntry { count: 4, reset_time: now },
        );
        limiter.store().set(
            "rate_limit:general_api:live",
            RateLimitEntry { count: 1, reset_time: now + Duration::from_secs(3600) },
        );

        let token = CancellationToken::new();
        let handle = limiter.spawn_sweeper(Duration::from_secs(60), token.clone());
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(limiter.store().get("rate_limit:general_api:stale").is_none());
        assert!(limiter.store().get("rate_limit:general_api:live").is_some());
        assert_eq!(limiter.store().len(), 1);

        token.cancel();
        handle.await.unwrap();
    }
}
