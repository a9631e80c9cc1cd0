//! Browser launch configuration.
//!
//! These types are always compiled, so config parsing works without the
//! `browser` feature.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a browser-backed driver picks the next item from a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategyType {
    /// Rotate through entries consecutively
    #[default]
    RoundRobin,
    /// Random selection each session
    Random,
}

impl std::str::FromStr for SelectionStrategyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "").as_str() {
            "roundrobin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            _ => Err(format!(
                "Invalid selection strategy '{}'. Valid options: round-robin, random",
                s
            )),
        }
    }
}

impl std::fmt::Display for SelectionStrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round-robin"),
            Self::Random => write!(f, "random"),
        }
    }
}

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Upper bound in seconds on a single navigation, below the task timeout.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Explicit Chrome/Chromium binary. Discovered when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

fn default_headless() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            timeout: default_timeout(),
            chrome_args: Vec::new(),
            chrome_path: None,
            remote_url: None,
        }
    }
}

impl BrowserEngineConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }

    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `BROWSER_HEADLESS` - `0`/`false` to show the window
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("BROWSER_URL") {
            if !val.is_empty() {
                self.remote_url = Some(val);
            }
        }
        if let Ok(val) = std::env::var("BROWSER_HEADLESS") {
            if val == "0" || val.eq_ignore_ascii_case("false") {
                self.headless = false;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_parses_loosely() {
        assert_eq!(
            "Round-Robin".parse::<SelectionStrategyType>().unwrap(),
            SelectionStrategyType::RoundRobin
        );
        assert_eq!(
            "random".parse::<SelectionStrategyType>().unwrap(),
            SelectionStrategyType::Random
        );
        assert!("sticky".parse::<SelectionStrategyType>().is_err());
    }

    #[test]
    fn defaults_are_headless() {
        let cfg: BrowserEngineConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.headless);
        assert_eq!(cfg.page_load_timeout(), Duration::from_secs(30));
        assert!(cfg.remote_url.is_none());
    }

    #[test]
    fn zero_page_load_timeout_is_clamped() {
        let cfg: BrowserEngineConfig = serde_json::from_str(r#"{"timeout": 0}"#).unwrap();
        assert_eq!(cfg.page_load_timeout(), Duration::from_secs(1));
    }
}
