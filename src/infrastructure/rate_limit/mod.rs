//! In-memory token bucket rate limiting.
//!
//! - [`RateLimiterStore`] - per-identifier buckets behind sharded locks
//! - [`spawn_sweeper`] - cancellable background expiry of idle buckets
//!
//! State is per-process: several instances of the service each keep their
//! own independent limits.

mod bucket;
mod store;
mod sweeper;

pub use bucket::BucketState;
pub use store::{RateLimitConfig, RateLimitError, RateLimiterStore};
pub use sweeper::spawn_sweeper;
