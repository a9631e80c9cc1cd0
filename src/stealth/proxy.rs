//! Proxy assignment for browser sessions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::error::ConfigError;

/// A proxy server plus optional credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    /// `scheme://host:port`, as Chrome's `--proxy-server` expects it.
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyEndpoint {
    /// Parse `scheme://[user:pass@]host:port`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| ConfigError::Invalid(format!("bad proxy URL {}: {}", raw, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::Invalid(format!("proxy URL has no host: {}", raw)))?;
        if !matches!(url.scheme(), "http" | "https" | "socks4" | "socks5") {
            return Err(ConfigError::Invalid(format!(
                "unsupported proxy scheme {}",
                url.scheme()
            )));
        }
        let server = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };
        let username = (!url.username().is_empty()).then(|| url.username().to_string());
        Ok(Self {
            server,
            username,
            password: url.password().map(str::to_string),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some()
    }
}

/// External allocator of proxy endpoints.
#[async_trait]
pub trait ProxyManager: Send + Sync {
    /// Next usable endpoint, or `None` to go direct.
    async fn allocate(&self) -> Option<ProxyEndpoint>;

    async fn report_failure(&self, endpoint: &ProxyEndpoint);

    async fn report_success(&self, endpoint: &ProxyEndpoint);
}

/// Health tracking for a single proxy.
#[derive(Debug)]
struct ProxyHealth {
    healthy: bool,
    consecutive_failures: u32,
    last_update: Instant,
}

impl Default for ProxyHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
            last_update: Instant::now(),
        }
    }
}

/// Configuration-driven rotating pool.
///
/// A proxy is marked unusable after `unhealthy_threshold` consecutive
/// failures and restored once `cooldown` has elapsed.
pub struct StaticProxyPool {
    endpoints: Vec<ProxyEndpoint>,
    health: Mutex<Vec<ProxyHealth>>,
    cursor: AtomicUsize,
    unhealthy_threshold: u32,
    cooldown: Duration,
}

impl StaticProxyPool {
    pub fn new(endpoints: Vec<ProxyEndpoint>, unhealthy_threshold: u32, cooldown: Duration) -> Self {
        let health = endpoints.iter().map(|_| ProxyHealth::default()).collect();
        Self {
            endpoints,
            health: Mutex::new(health),
            cursor: AtomicUsize::new(0),
            unhealthy_threshold: unhealthy_threshold.max(1),
            cooldown,
        }
    }

    /// Parse a list of proxy URLs.
    pub fn from_urls(
        urls: &[String],
        unhealthy_threshold: u32,
        cooldown: Duration,
    ) -> Result<Self, ConfigError> {
        let endpoints = urls
            .iter()
            .map(|u| ProxyEndpoint::parse(u))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(endpoints, unhealthy_threshold, cooldown))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Number of endpoints currently usable.
    pub async fn healthy_count(&self) -> usize {
        self.health.lock().await.iter().filter(|h| h.healthy).count()
    }

    fn index_of(&self, endpoint: &ProxyEndpoint) -> Option<usize> {
        self.endpoints.iter().position(|e| e == endpoint)
    }
}

#[async_trait]
impl ProxyManager for StaticProxyPool {
    async fn allocate(&self) -> Option<ProxyEndpoint> {
        let count = self.endpoints.len();
        if count == 0 {
            return None;
        }
        let mut health = self.health.lock().await;
        let now = Instant::now();

        // Check if any unhealthy proxies should be retried
        for h in health.iter_mut() {
            if !h.healthy && now.duration_since(h.last_update) >= self.cooldown {
                debug!("Restoring proxy to healthy status after cool-down");
                h.healthy = true;
                h.consecutive_failures = 0;
                h.last_update = now;
            }
        }

        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % count;
        for i in 0..count {
            let idx = (start + i) % count;
            if health[idx].healthy {
                return Some(self.endpoints[idx].clone());
            }
        }
        warn!("All {} proxies marked unusable, connecting directly", count);
        None
    }

    async fn report_failure(&self, endpoint: &ProxyEndpoint) {
        let Some(idx) = self.index_of(endpoint) else {
            return;
        };
        let mut health = self.health.lock().await;
        let h = &mut health[idx];
        h.consecutive_failures += 1;
        h.last_update = Instant::now();
        if h.healthy && h.consecutive_failures >= self.unhealthy_threshold {
            h.healthy = false;
            warn!(
                "Proxy {} marked unusable after {} consecutive failures",
                endpoint.server, h.consecutive_failures
            );
        }
    }

    async fn report_success(&self, endpoint: &ProxyEndpoint) {
        let Some(idx) = self.index_of(endpoint) else {
            return;
        };
        let mut health = self.health.lock().await;
        let h = &mut health[idx];
        if h.consecutive_failures > 0 || !h.healthy {
            debug!("Proxy {} recovered", endpoint.server);
        }
        h.healthy = true;
        h.consecutive_failures = 0;
        h.last_update = Instant::now();
    }
}
