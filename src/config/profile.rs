//! Per-vendor site profiles.
//!
//! Profiles are declarative and immutable once loaded. Everything the engine
//! needs at runtime is validated here so that a bad selector or a missing
//! pagination bound is a load-time error rather than a mid-cycle surprise.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::ConfigError;

/// How heavy a vendor's storefront is to render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplexityTier {
    #[default]
    Simple,
    Moderate,
    Complex,
    VeryComplex,
}

/// Page retrieval mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    Http,
    Browser,
    Stealth,
}

impl FetchStrategy {
    pub fn is_browser(&self) -> bool {
        matches!(self, Self::Browser | Self::Stealth)
    }

    /// The next tier up, used when the orchestrator escalates a failed task.
    pub fn escalate(&self) -> Option<Self> {
        match self {
            Self::Http => Some(Self::Browser),
            Self::Browser => Some(Self::Stealth),
            Self::Stealth => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Browser => "browser",
            Self::Stealth => "stealth",
        }
    }
}

impl std::fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeLevel {
    #[default]
    None,
    CaptchaPresent,
}

/// Pagination strategy with its bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PaginationStrategy {
    #[default]
    None,
    /// Page URLs built from a template containing `{page}`.
    Numbered {
        url_template: String,
        #[serde(default = "default_max_pages")]
        max_pages: u32,
    },
    InfiniteScroll {
        #[serde(default = "default_max_scrolls")]
        max_scrolls: u32,
        #[serde(default = "default_scroll_pause_ms")]
        scroll_pause_ms: u64,
    },
    LoadMore {
        #[serde(default = "default_max_clicks")]
        max_clicks: u32,
        #[serde(default = "default_settle_ms")]
        settle_ms: u64,
    },
}

fn default_max_pages() -> u32 {
    5
}
fn default_max_scrolls() -> u32 {
    10
}
fn default_scroll_pause_ms() -> u64 {
    1500
}
fn default_max_clicks() -> u32 {
    10
}
fn default_settle_ms() -> u64 {
    2000
}

impl PaginationStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Numbered { .. } => "numbered",
            Self::InfiniteScroll { .. } => "infinite-scroll",
            Self::LoadMore { .. } => "load-more",
        }
    }

    /// Strategies that drive DOM interaction and therefore need a browser.
    pub fn needs_browser(&self) -> bool {
        matches!(self, Self::InfiniteScroll { .. } | Self::LoadMore { .. })
    }
}

/// Selectors by extraction role.
///
/// All roles are optional at the serde level so that a missing required role
/// produces a profile-specific validation message instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_more_control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_control: Option<String>,
}

impl SelectorSet {
    fn roles(&self) -> [(&'static str, Option<&String>); 8] {
        [
            ("list", self.list.as_ref()),
            ("title", self.title.as_ref()),
            ("price", self.price.as_ref()),
            ("link", self.link.as_ref()),
            ("image", self.image.as_ref()),
            ("availability", self.availability.as_ref()),
            ("load_more_control", self.load_more_control.as_ref()),
            ("next_page_control", self.next_page_control.as_ref()),
        ]
    }
}

/// Inclusive range for the randomized delay between same-domain requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for RateLimitRange {
    fn default() -> Self {
        Self {
            min_ms: 1000,
            max_ms: 3000,
        }
    }
}

/// Declarative crawl configuration for one vendor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub domain: String,
    pub seed_urls: Vec<String>,
    /// Market-share weight; higher runs first.
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub complexity_tier: ComplexityTier,
    /// Falls back to the tier default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_strategy: Option<FetchStrategy>,
    #[serde(default)]
    pub selectors: SelectorSet,
    #[serde(default)]
    pub pagination: PaginationStrategy,
    #[serde(default)]
    pub rate_limit: RateLimitRange,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub requires_session: bool,
    #[serde(default)]
    pub known_challenge_level: ChallengeLevel,
}

impl SiteProfile {
    /// Strategy the orchestrator dispatches to first.
    pub fn effective_strategy(&self) -> FetchStrategy {
        if self.complexity_tier == ComplexityTier::VeryComplex
            || self.known_challenge_level == ChallengeLevel::CaptchaPresent
        {
            return FetchStrategy::Stealth;
        }
        if let Some(strategy) = self.preferred_strategy {
            return strategy;
        }
        match self.complexity_tier {
            ComplexityTier::Simple => FetchStrategy::Http,
            ComplexityTier::Moderate | ComplexityTier::Complex => FetchStrategy::Browser,
            ComplexityTier::VeryComplex => FetchStrategy::Stealth,
        }
    }

    /// Whether stealth sessions are permitted for this vendor.
    pub fn allows_stealth(&self) -> bool {
        self.complexity_tier == ComplexityTier::VeryComplex
            || self.known_challenge_level == ChallengeLevel::CaptchaPresent
    }

    /// Check everything the engine relies on at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let domain = self.domain.trim();
        if domain.is_empty() {
            return Err(ConfigError::Invalid("profile with empty domain".to_string()));
        }
        if self.seed_urls.is_empty() {
            return Err(ConfigError::profile(domain, "no seed URLs"));
        }
        for seed in &self.seed_urls {
            match Url::parse(seed) {
                Ok(u) if matches!(u.scheme(), "http" | "https") => {}
                _ => {
                    return Err(ConfigError::profile(
                        domain,
                        format!("seed URL is not an absolute http(s) URL: {}", seed),
                    ))
                }
            }
        }

        for role in ["list", "title", "price"] {
            let present = self
                .selectors
                .roles()
                .iter()
                .any(|(name, sel)| *name == role && sel.is_some_and(|s| !s.trim().is_empty()));
            if !present {
                return Err(ConfigError::profile(
                    domain,
                    format!("missing required selector `{}`", role),
                ));
            }
        }
        for (role, selector) in self.selectors.roles() {
            if let Some(selector) = selector {
                if Selector::parse(selector).is_err() {
                    return Err(ConfigError::profile(
                        domain,
                        format!("selector `{}` is not valid CSS: {}", role, selector),
                    ));
                }
            }
        }

        match &self.pagination {
            PaginationStrategy::None => {}
            PaginationStrategy::Numbered {
                url_template,
                max_pages,
            } => {
                if !url_template.contains("{page}") {
                    return Err(ConfigError::profile(
                        domain,
                        "numbered pagination template lacks a {page} placeholder",
                    ));
                }
                if *max_pages == 0 {
                    return Err(ConfigError::profile(domain, "max_pages must be at least 1"));
                }
            }
            PaginationStrategy::InfiniteScroll { max_scrolls, .. } => {
                if *max_scrolls == 0 {
                    return Err(ConfigError::profile(domain, "max_scrolls must be at least 1"));
                }
            }
            PaginationStrategy::LoadMore { max_clicks, .. } => {
                if *max_clicks == 0 {
                    return Err(ConfigError::profile(domain, "max_clicks must be at least 1"));
                }
                if self.selectors.load_more_control.is_none() {
                    return Err(ConfigError::profile(
                        domain,
                        "load-more pagination requires selector `load_more_control`",
                    ));
                }
            }
        }

        if self.pagination.needs_browser() && !self.effective_strategy().is_browser() {
            return Err(ConfigError::profile(
                domain,
                format!(
                    "{} pagination needs a browser strategy, profile resolves to http",
                    self.pagination.name()
                ),
            ));
        }
        if self.preferred_strategy == Some(FetchStrategy::Stealth) && !self.allows_stealth() {
            return Err(ConfigError::profile(
                domain,
                "stealth is reserved for very-complex tiers or captcha-present vendors",
            ));
        }
        if self.rate_limit.min_ms > self.rate_limit.max_ms {
            return Err(ConfigError::profile(
                domain,
                "rate_limit.min_ms exceeds rate_limit.max_ms",
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileDocument {
    Wrapped { profiles: Vec<SiteProfile> },
    Bare(Vec<SiteProfile>),
}

/// Validated profiles ordered by priority, highest first.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    profiles: Vec<SiteProfile>,
}

impl ProfileSet {
    /// Validate and order a list of profiles.
    pub fn new(mut profiles: Vec<SiteProfile>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for profile in &profiles {
            profile.validate()?;
            if !seen.insert(profile.domain.to_lowercase()) {
                return Err(ConfigError::DuplicateDomain(profile.domain.clone()));
            }
        }
        // Stable sort keeps file order among equal weights.
        profiles.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        Ok(Self { profiles })
    }

    /// Load profiles from a JSON, TOML or YAML file (chosen by extension).
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let set = Self::parse(&contents, ext)?;
        info!("Loaded {} site profile(s) from {}", set.len(), path.display());
        Ok(set)
    }

    /// Parse profile text in the given format.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, ConfigError> {
        let document: ProfileDocument = match ext {
            "toml" => toml::from_str(contents).map_err(|e| ConfigError::Format {
                format: "TOML",
                message: e.to_string(),
            })?,
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| ConfigError::Format {
                format: "YAML",
                message: e.to_string(),
            })?,
            _ => serde_json::from_str(contents).map_err(|e| ConfigError::Format {
                format: "JSON",
                message: e.to_string(),
            })?,
        };
        let profiles = match document {
            ProfileDocument::Wrapped { profiles } | ProfileDocument::Bare(profiles) => profiles,
        };
        debug!("Parsed {} profile(s)", profiles.len());
        Self::new(profiles)
    }

    /// Keep only the named domains (case-insensitive). Empty filter keeps all.
    pub fn retain_domains(&mut self, domains: &[String]) {
        if domains.is_empty() {
            return;
        }
        self.profiles
            .retain(|p| domains.iter().any(|d| d.eq_ignore_ascii_case(&p.domain)));
    }

    pub fn get(&self, domain: &str) -> Option<&SiteProfile> {
        self.profiles
            .iter()
            .find(|p| p.domain.eq_ignore_ascii_case(domain))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
