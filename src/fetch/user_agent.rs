//! Realistic client identity strings for the HTTP driver.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Real browser user agents, rotated per request.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    // Chrome on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Chrome on Android, a large share of Iranian storefront traffic
    "Mozilla/5.0 (Linux; Android 13; SM-A536B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Firefox on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Safari on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

/// Cycles through [`IMPERSONATE_USER_AGENTS`].
#[derive(Debug, Default)]
pub struct UserAgentRotator {
    counter: AtomicUsize,
}

impl UserAgentRotator {
    /// Start at a random offset so parallel runs don't share a sequence.
    pub fn new() -> Self {
        use rand::Rng;
        Self {
            counter: AtomicUsize::new(rand::thread_rng().gen_range(0..IMPERSONATE_USER_AGENTS.len())),
        }
    }

    pub fn next(&self) -> &'static str {
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % IMPERSONATE_USER_AGENTS.len();
        IMPERSONATE_USER_AGENTS[idx]
    }
}
