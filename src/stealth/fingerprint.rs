//! Device fingerprint pool and per-session selection strategies.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use serde::Serialize;

use crate::config::SelectionStrategyType;

/// A realistic device profile applied to one browser session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AntiDetectionProfile {
    pub name: &'static str,
    pub user_agent: &'static str,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_scale_factor: f64,
    pub locale: &'static str,
    pub languages: &'static [&'static str],
    pub timezone: &'static str,
    pub platform: &'static str,
    pub webgl_vendor: &'static str,
    pub webgl_renderer: &'static str,
    pub device_memory_gb: u32,
    pub hardware_concurrency: u32,
}

/// Built-in fingerprints. Desktop Chrome on common hardware, Tehran time.
pub const FINGERPRINTS: &[AntiDetectionProfile] = &[
    AntiDetectionProfile {
        name: "win10-chrome-intel",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        viewport_width: 1920,
        viewport_height: 1080,
        device_scale_factor: 1.0,
        locale: "fa-IR",
        languages: &["fa-IR", "fa", "en-US", "en"],
        timezone: "Asia/Tehran",
        platform: "Win32",
        webgl_vendor: "Google Inc. (Intel)",
        webgl_renderer: "ANGLE (Intel, Intel(R) UHD Graphics 620 Direct3D11 vs_5_0 ps_5_0, D3D11)",
        device_memory_gb: 8,
        hardware_concurrency: 8,
    },
    AntiDetectionProfile {
        name: "win11-chrome-nvidia",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        viewport_width: 1536,
        viewport_height: 864,
        device_scale_factor: 1.25,
        locale: "fa-IR",
        languages: &["fa-IR", "fa", "en"],
        timezone: "Asia/Tehran",
        platform: "Win32",
        webgl_vendor: "Google Inc. (NVIDIA)",
        webgl_renderer: "ANGLE (NVIDIA, NVIDIA GeForce GTX 1650 Direct3D11 vs_5_0 ps_5_0, D3D11)",
        device_memory_gb: 16,
        hardware_concurrency: 12,
    },
    AntiDetectionProfile {
        name: "win10-chrome-amd",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        viewport_width: 1366,
        viewport_height: 768,
        device_scale_factor: 1.0,
        locale: "en-US",
        languages: &["en-US", "en", "fa"],
        timezone: "Asia/Tehran",
        platform: "Win32",
        webgl_vendor: "Google Inc. (AMD)",
        webgl_renderer: "ANGLE (AMD, AMD Radeon(TM) Graphics Direct3D11 vs_5_0 ps_5_0, D3D11)",
        device_memory_gb: 8,
        hardware_concurrency: 6,
    },
    AntiDetectionProfile {
        name: "macos-chrome-m1",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        viewport_width: 1440,
        viewport_height: 900,
        device_scale_factor: 2.0,
        locale: "fa-IR",
        languages: &["fa-IR", "fa", "en-US", "en"],
        timezone: "Asia/Tehran",
        platform: "MacIntel",
        webgl_vendor: "Apple Inc.",
        webgl_renderer: "Apple M1",
        device_memory_gb: 8,
        hardware_concurrency: 8,
    },
    AntiDetectionProfile {
        name: "linux-chrome-intel",
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        viewport_width: 1600,
        viewport_height: 900,
        device_scale_factor: 1.0,
        locale: "en-US",
        languages: &["en-US", "en"],
        timezone: "Asia/Tehran",
        platform: "Linux x86_64",
        webgl_vendor: "Intel Inc.",
        webgl_renderer: "Intel Iris OpenGL Engine",
        device_memory_gb: 4,
        hardware_concurrency: 4,
    },
];

/// Strategy for picking the next fingerprint index.
pub trait SelectionStrategy: Send + Sync {
    /// Select an index below `count`; `None` only when `count` is zero.
    fn select(&self, count: usize) -> Option<usize>;
}

/// Round-robin selection - rotates through entries consecutively.
#[derive(Default)]
pub struct RoundRobinSelection {
    counter: AtomicUsize,
}

impl SelectionStrategy for RoundRobinSelection {
    fn select(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        Some(self.counter.fetch_add(1, Ordering::Relaxed) % count)
    }
}

/// Random selection - picks a random entry each time.
pub struct RandomSelection;

impl SelectionStrategy for RandomSelection {
    fn select(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        Some(rand::thread_rng().gen_range(0..count))
    }
}

/// Create a selection strategy from its config type.
pub fn create_strategy(strategy_type: SelectionStrategyType) -> Box<dyn SelectionStrategy> {
    match strategy_type {
        SelectionStrategyType::RoundRobin => Box::new(RoundRobinSelection::default()),
        SelectionStrategyType::Random => Box::new(RandomSelection),
    }
}

/// Read-only fingerprint pool shared by all browser sessions.
pub struct FingerprintPool {
    profiles: Vec<AntiDetectionProfile>,
    strategy: Box<dyn SelectionStrategy>,
}

impl FingerprintPool {
    pub fn new(selection: SelectionStrategyType) -> Self {
        Self::with_profiles(FINGERPRINTS.to_vec(), selection)
    }

    /// Pool over custom profiles; an empty list falls back to the built-ins.
    pub fn with_profiles(
        profiles: Vec<AntiDetectionProfile>,
        selection: SelectionStrategyType,
    ) -> Self {
        let profiles = if profiles.is_empty() {
            FINGERPRINTS.to_vec()
        } else {
            profiles
        };
        Self {
            profiles,
            strategy: create_strategy(selection),
        }
    }

    /// Fingerprint for the next session.
    pub fn next(&self) -> AntiDetectionProfile {
        let idx = self.strategy.select(self.profiles.len()).unwrap_or(0);
        self.profiles[idx].clone()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_cycles() {
        let s = RoundRobinSelection::default();
        let picks: Vec<_> = (0..4).filter_map(|_| s.select(3)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0]);
        assert_eq!(s.select(0), None);
    }

    #[test]
    fn random_stays_in_range() {
        for _ in 0..50 {
            assert!(RandomSelection.select(4).unwrap() < 4);
        }
    }

    #[test]
    fn pool_rotates_distinct_profiles() {
        let pool = FingerprintPool::new(SelectionStrategyType::RoundRobin);
        let a = pool.next();
        let b = pool.next();
        assert_ne!(a.name, b.name);
        assert_eq!(pool.len(), FINGERPRINTS.len());
    }

    #[test]
    fn fingerprints_are_consistent() {
        for fp in FINGERPRINTS {
            assert!(fp.languages.contains(&fp.locale) || fp.languages[0].starts_with("en"));
            if fp.platform == "Win32" {
                assert!(fp.user_agent.contains("Windows"));
            }
            if fp.platform == "MacIntel" {
                assert!(fp.user_agent.contains("Macintosh"));
            }
        }
    }
}
