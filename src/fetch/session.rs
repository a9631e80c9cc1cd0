//! Browser session pool owned by the orchestrator.
//!
//! Sessions are handed out as [`SessionLease`]s. A lease holds a semaphore
//! permit for its whole lifetime, so the browser-session cap is released on
//! every exit path, including errors and cancellation.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ScrapeError;
use crate::stealth::{AntiDetectionProfile, FingerprintPool, ProxyEndpoint, ProxyManager};

/// Checked-out browser session configuration.
pub struct SessionLease {
    _permit: OwnedSemaphorePermit,
    pub fingerprint: AntiDetectionProfile,
    pub proxy: Option<ProxyEndpoint>,
    /// Full anti-detection setup requested.
    pub stealth: bool,
    proxies: Option<Arc<dyn ProxyManager>>,
}

impl SessionLease {
    /// Tell the proxy manager how the session's proxy fared.
    pub async fn report(&self, success: bool) {
        let (Some(manager), Some(endpoint)) = (&self.proxies, &self.proxy) else {
            return;
        };
        if success {
            manager.report_success(endpoint).await;
        } else {
            manager.report_failure(endpoint).await;
        }
    }
}

impl std::fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLease")
            .field("fingerprint", &self.fingerprint.name)
            .field("proxy", &self.proxy.as_ref().map(|p| &p.server))
            .field("stealth", &self.stealth)
            .finish()
    }
}

pub struct SessionPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    fingerprints: FingerprintPool,
    proxies: Option<Arc<dyn ProxyManager>>,
}

impl SessionPool {
    pub fn new(
        capacity: usize,
        fingerprints: FingerprintPool,
        proxies: Option<Arc<dyn ProxyManager>>,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            fingerprints,
            proxies,
        }
    }

    /// Check out a session, waiting for a free slot.
    ///
    /// Stealth sessions get a proxy from the manager when one is configured.
    /// A closed pool means no session can ever be allocated, which is
    /// reported as resource exhaustion.
    pub async fn acquire(
        &self,
        stealth: bool,
        cancel: &CancellationToken,
    ) -> Result<SessionLease, ScrapeError> {
        let permit = tokio::select! {
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            permit = self.permits.clone().acquire_owned() => permit.map_err(|_| {
                ScrapeError::ResourceExhausted("browser session pool is closed".to_string())
            })?,
        };

        let fingerprint = self.fingerprints.next();
        let proxy = match (&self.proxies, stealth) {
            (Some(manager), true) => manager.allocate().await,
            _ => None,
        };
        debug!(
            "Session checked out: fingerprint={} proxy={} ({} of {} free)",
            fingerprint.name,
            proxy.as_ref().map(|p| p.server.as_str()).unwrap_or("direct"),
            self.permits.available_permits(),
            self.capacity
        );

        Ok(SessionLease {
            _permit: permit,
            fingerprint,
            proxy,
            stealth,
            proxies: self.proxies.clone(),
        })
    }

    /// Refuse all further checkouts.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
