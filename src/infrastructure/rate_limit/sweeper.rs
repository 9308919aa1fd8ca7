//! Background expiry of idle rate limit buckets.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::store::RateLimiterStore;

/// Spawns a task that calls [`RateLimiterStore::sweep`] every `period`.
///
/// The task exits once `shutdown` is cancelled; await the returned handle
/// during teardown.
///
/// # Example
///
/// ```rust,ignore
/// let shutdown = CancellationToken::new();
/// let sweeper = spawn_sweeper(store.clone(), store.ttl(), shutdown.clone());
///
/// // ... serve requests ...
///
/// shutdown.cancel();
/// sweeper.await?;
/// ```
pub fn spawn_sweeper(
    store: Arc<RateLimiterStore>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Rate limit sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = store.sweep();
                    if removed > 0 {
                        debug!(removed, remaining = store.len(), "Expired idle rate limit buckets");
                    }
                }
            }
        }
    })
}
