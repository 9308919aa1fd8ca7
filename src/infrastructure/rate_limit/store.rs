//! Identifier-keyed token bucket store.

use dashmap::DashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use super::bucket::BucketState;

/// Token bucket parameters.
///
/// All values are explicit; there is intentionally no `Default`.
/// Environment-driven defaults live in [`crate::config::Config`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Refill rate in tokens per second.
    pub rate: f64,
    /// Maximum number of tokens a bucket can hold.
    pub burst: u32,
    /// Idle time after which a bucket is dropped by the sweep.
    pub ttl: Duration,
}

impl RateLimitConfig {
    /// Builds a configuration from a per-minute request budget.
    ///
    /// `per_minute(1000, 30, ttl)` refills at roughly 16.6 tokens per second.
    pub fn per_minute(requests: u32, burst: u32, ttl: Duration) -> Self {
        Self {
            rate: f64::from(requests) / 60.0,
            burst,
            ttl,
        }
    }
}

/// Invalid rate limiter configuration.
#[derive(Debug, Error, PartialEq)]
pub enum RateLimitError {
    #[error("rate must be a positive finite number of tokens per second, got {0}")]
    InvalidRate(f64),
    #[error("burst must be at least 1")]
    InvalidBurst,
    #[error("ttl must be greater than zero")]
    InvalidTtl,
}

/// In-memory map from client identifier to its token bucket.
///
/// Buckets live in a sharded [`DashMap`], so every read-modify-write on one
/// identifier runs under that identifier's shard lock and unrelated clients
/// rarely contend. The expiry sweep takes the same shard locks.
///
/// # Example
///
/// ```rust
/// use request_gate::infrastructure::rate_limit::{RateLimitConfig, RateLimiterStore};
/// use std::time::Duration;
///
/// let store = RateLimiterStore::new(RateLimitConfig {
///     rate: 1.0,
///     burst: 2,
///     ttl: Duration::from_secs(60),
/// })
/// .unwrap();
///
/// assert!(store.allow("10.0.0.1"));
/// assert!(store.allow("10.0.0.1"));
/// assert!(!store.allow("10.0.0.1"));
/// assert!(store.allow("10.0.0.2"));
/// ```
#[derive(Debug)]
pub struct RateLimiterStore {
    buckets: DashMap<String, BucketState>,
    rate: f64,
    burst: f64,
    ttl: Duration,
}

impl RateLimiterStore {
    /// Creates an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError`] if the rate is not positive and finite,
    /// the burst is zero, or the ttl is zero.
    pub fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        if !config.rate.is_finite() || config.rate <= 0.0 {
            return Err(RateLimitError::InvalidRate(config.rate));
        }
        if config.burst == 0 {
            return Err(RateLimitError::InvalidBurst);
        }
        if config.ttl.is_zero() {
            return Err(RateLimitError::InvalidTtl);
        }

        Ok(Self {
            buckets: DashMap::new(),
            rate: config.rate,
            burst: f64::from(config.burst),
            ttl: config.ttl,
        })
    }

    /// Takes one token for `identifier`.
    ///
    /// Unknown identifiers start with a full bucket. Returns `false` when
    /// the bucket holds less than one token; nothing is consumed then.
    pub fn allow(&self, identifier: &str) -> bool {
        let now = Instant::now();

        if let Some(mut bucket) = self.buckets.get_mut(identifier) {
            return bucket.try_acquire(now, self.rate, self.burst);
        }

        self.buckets
            .entry(identifier.to_owned())
            .or_insert_with(|| BucketState::new(self.burst, now))
            .try_acquire(now, self.rate, self.burst)
    }

    /// Removes buckets idle for longer than the ttl.
    ///
    /// Returns the number of removed buckets.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.buckets.retain(|_, bucket| {
            let keep = !bucket.is_idle(now, self.ttl);
            if !keep {
                removed += 1;
            }
            keep
        });

        removed
    }

    /// Tokens left for `identifier` as of its last access.
    pub fn tokens(&self, identifier: &str) -> Option<f64> {
        self.buckets.get(identifier).map(|bucket| bucket.tokens())
    }

    /// Number of tracked identifiers.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store(rate: f64, burst: u32, ttl_secs: u64) -> RateLimiterStore {
        RateLimiterStore::new(RateLimitConfig {
            rate,
            burst,
            ttl: Duration::from_secs(ttl_secs),
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let ttl = Duration::from_secs(60);

        let err = RateLimiterStore::new(RateLimitConfig {
            rate: 0.0,
            burst: 1,
            ttl,
        })
        .unwrap_err();
        assert_eq!(err, RateLimitError::InvalidRate(0.0));

        let err = RateLimiterStore::new(RateLimitConfig {
            rate: f64::NAN,
            burst: 1,
            ttl,
        })
        .unwrap_err();
        assert!(matches!(err, RateLimitError::InvalidRate(_)));

        let err = RateLimiterStore::new(RateLimitConfig {
            rate: 1.0,
            burst: 0,
            ttl,
        })
        .unwrap_err();
        assert_eq!(err, RateLimitError::InvalidBurst);

        let err = RateLimiterStore::new(RateLimitConfig {
            rate: 1.0,
            burst: 1,
            ttl: Duration::ZERO,
        })
        .unwrap_err();
        assert_eq!(err, RateLimitError::InvalidTtl);
    }

    #[test]
    fn test_per_minute_rate() {
        let config = RateLimitConfig::per_minute(1000, 30, Duration::from_secs(60));
        assert!((config.rate - 16.666).abs() < 0.01);
        assert_eq!(config.burst, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_refill() {
        let store = store(16.6, 30, 60);

        for i in 0..30 {
            assert!(store.allow("client"), "request {i} should be allowed");
        }
        assert!(!store.allow("client"));

        tokio::time::advance(Duration::from_secs(1)).await;

        let allowed = (0..30).filter(|_| store.allow("client")).count();
        assert_eq!(allowed, 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identifiers_are_isolated() {
        let store = store(1.0, 3, 60);

        for _ in 0..3 {
            assert!(store.allow("x"));
        }
        assert!(!store.allow("x"));

        assert_eq!(store.tokens("y"), None);
        assert!(store.allow("y"));
        assert_eq!(store.tokens("y"), Some(2.0));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_idle_buckets() {
        let store = store(1.0, 5, 60);

        for _ in 0..5 {
            store.allow("idle");
        }
        assert!(!store.allow("idle"));

        tokio::time::advance(Duration::from_secs(30)).await;
        store.allow("active");

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.tokens("idle"), None);
        assert!(store.tokens("active").is_some());

        assert!(store.allow("idle"));
        assert_eq!(store.tokens("idle"), Some(4.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_recent_buckets() {
        let store = store(1.0, 5, 60);
        store.allow("a");

        tokio::time::advance(Duration::from_secs(60)).await;

        assert_eq!(store.sweep(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_callers_never_over_admit() {
        let store = Arc::new(store(0.001, 30, 60));
        let admitted = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..200 {
            let store = store.clone();
            let admitted = admitted.clone();
            handles.push(tokio::spawn(async move {
                if store.allow("shared") {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 30);
        assert!(store.tokens("shared").unwrap() < 1.0);
    }
}
