//! Randomized per-domain request spacing.
//!
//! Each domain remembers when its last request started or, once reported
//! through [`DomainPacer::complete`], finished. A caller reserves the next
//! slot under the lock, then sleeps outside it, so concurrent requests to one
//! domain queue up behind each other while different domains proceed
//! independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RateLimitRange;
use crate::error::ScrapeError;

#[derive(Debug, Default)]
pub struct DomainPacer {
    domains: Arc<RwLock<HashMap<String, Instant>>>,
}

impl DomainPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniform draw from `[min_ms, max_ms]`.
    pub fn draw<R: Rng + ?Sized>(range: &RateLimitRange, rng: &mut R) -> Duration {
        if range.max_ms <= range.min_ms {
            return Duration::from_millis(range.min_ms);
        }
        Duration::from_millis(rng.gen_range(range.min_ms..=range.max_ms))
    }

    /// Reserve the next slot for `domain` and wait for it.
    ///
    /// The first request to a domain goes out immediately.
    pub async fn acquire(
        &self,
        domain: &str,
        range: &RateLimitRange,
        cancel: &CancellationToken,
    ) -> Result<(), ScrapeError> {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        let now = Instant::now();
        let start_at = {
            let mut domains = self.domains.write().await;
            let start_at = match domains.get(domain) {
                Some(previous) => {
                    let delay = Self::draw(range, &mut rand::thread_rng());
                    (*previous + delay).max(now)
                }
                None => now,
            };
            domains.insert(domain.to_string(), start_at);
            start_at
        };

        if start_at > now {
            debug!("Pacing {}: waiting {:?}", domain, start_at - now);
            tokio::select! {
                _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                _ = tokio::time::sleep_until(start_at) => {}
            }
        }
        Ok(())
    }

    /// Mark the domain's in-flight request as finished, so the next delay
    /// counts from now rather than from when it started.
    pub async fn complete(&self, domain: &str) {
        let now = Instant::now();
        let mut domains = self.domains.write().await;
        if let Some(last) = domains.get_mut(domain) {
            if *last < now {
                *last = now;
            }
        }
    }
}
