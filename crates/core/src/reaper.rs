//! Background TTL eviction for idle sessions.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::registry::Registry;

/// Periodically evicts sessions idle longer than `ttl`.
///
/// The reaper owns no state beyond its handle to the [`Registry`]; it is
/// just a loop, so it is cheap to spawn and cheap to cancel.
pub struct Reaper {
    registry: Registry,
    ttl: Duration,
    interval: Duration,
    cancel: CancellationToken,
}

impl Reaper {
    pub fn new(registry: Registry, ttl: Duration, interval: Duration) -> Self {
        Self {
            registry,
            ttl,
            interval,
            cancel: CancellationToken::new(),
        }
    }

    /// A token that [`shutdown`](Reaper::shutdown) cancels; clone it before
    /// spawning [`run`](Reaper::run) if the caller needs to trigger the same
    /// shutdown from elsewhere (e.g. the server's own signal handler).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request the running loop to stop after its current tick.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Run the eviction loop until cancelled. Intended to be driven by
    /// `tokio::spawn`.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick fires immediately; skip it so the reaper doesn't
        // evict anything before `ttl` has had a chance to elapse.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!("ttl reaper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = self.registry.cleanup_expired(self.ttl).await;
                    if evicted > 0 {
                        tracing::info!(evicted, "reaped idle sessions");
                    }
                }
            }
        }
    }
}
