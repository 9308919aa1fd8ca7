//! Token bucket state for a single client.

use std::time::Duration;
use tokio::time::Instant;

/// Token bucket for one identifier.
///
/// Tokens refill continuously at the store's rate and never exceed its burst.
/// Timestamps only move forward, even when a caller observed `now` slightly
/// before another caller that already updated the bucket.
#[derive(Debug, Clone)]
pub struct BucketState {
    tokens: f64,
    last_refill: Instant,
    last_access: Instant,
}

impl BucketState {
    /// Creates a full bucket.
    pub fn new(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            last_refill: now,
            last_access: now,
        }
    }

    /// Tokens currently available, as of the last refill.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }

    pub fn last_access(&self) -> Instant {
        self.last_access
    }

    /// Refills for the time elapsed since the last refill, then takes one
    /// token if at least one is available.
    ///
    /// Returns `true` when a token was consumed.
    pub fn try_acquire(&mut self, now: Instant, rate: f64, burst: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate).min(burst);
        self.last_refill = self.last_refill.max(now);
        self.last_access = self.last_access.max(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whether the bucket has not been touched for longer than `ttl`.
    pub fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_access) > ttl
    }
}
