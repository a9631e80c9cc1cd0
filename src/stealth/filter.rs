//! Outgoing request filtering for stealth sessions.

use rand::Rng;
use url::Url;

/// Analytics, tag managers and ad networks common on Iranian storefronts.
pub const TRACKER_DOMAINS: &[&str] = &[
    "google-analytics.com",
    "googletagmanager.com",
    "doubleclick.net",
    "googlesyndication.com",
    "connect.facebook.net",
    "hotjar.com",
    "clarity.ms",
    "yektanet.com",
    "najva.com",
    "mediaad.org",
    "tapsell.ir",
    "pushe.co",
    "webengage.com",
    "smartlook.com",
    "sentry.io",
];

/// Resource category as reported by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Document,
    Script,
    Xhr,
    Image,
    Font,
    Stylesheet,
    Media,
    Other,
}

impl ResourceKind {
    /// From a CDP `ResourceType` name.
    pub fn from_cdp(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "document" => Self::Document,
            "script" => Self::Script,
            "xhr" | "fetch" => Self::Xhr,
            "image" => Self::Image,
            "font" => Self::Font,
            "stylesheet" => Self::Stylesheet,
            "media" => Self::Media,
            _ => Self::Other,
        }
    }

    /// Resources a page renders fine without.
    pub fn is_droppable(&self) -> bool {
        matches!(self, Self::Image | Self::Font | Self::Stylesheet | Self::Media)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Allow,
    BlockTracker,
    DropResource,
}

/// Decides which requests a stealth session lets through.
#[derive(Debug, Clone)]
pub struct RequestFilter {
    blocked_domains: Vec<String>,
    drop_fraction: f64,
}

impl RequestFilter {
    pub fn new(extra_blocked: &[String], drop_fraction: f64) -> Self {
        let mut blocked_domains: Vec<String> =
            TRACKER_DOMAINS.iter().map(|d| d.to_string()).collect();
        blocked_domains.extend(extra_blocked.iter().map(|d| d.trim().to_lowercase()));
        Self {
            blocked_domains,
            drop_fraction: drop_fraction.clamp(0.0, 1.0),
        }
    }

    pub fn decide(&self, url: &str, kind: ResourceKind) -> FilterDecision {
        self.decide_with_roll(url, kind, rand::thread_rng().gen::<f64>())
    }

    /// Decision with an explicit roll in `[0, 1)`.
    pub fn decide_with_roll(&self, url: &str, kind: ResourceKind, roll: f64) -> FilterDecision {
        if self.is_tracker(url) {
            return FilterDecision::BlockTracker;
        }
        if kind.is_droppable() && roll < self.drop_fraction {
            return FilterDecision::DropResource;
        }
        FilterDecision::Allow
    }

    /// Host equals a blocked domain or is a subdomain of one.
    pub fn is_tracker(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        else {
            return false;
        };
        self.blocked_domains.iter().any(|d| {
            host == *d || (host.ends_with(d.as_str()) && host[..host.len() - d.len()].ends_with('.'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trackers_always_blocked() {
        let f = RequestFilter::new(&[], 0.0);
        assert_eq!(
            f.decide_with_roll("https://www.googletagmanager.com/gtm.js", ResourceKind::Script, 0.99),
            FilterDecision::BlockTracker
        );
        assert_eq!(
            f.decide_with_roll("https://yektanet.com/x.js", ResourceKind::Script, 0.5),
            FilterDecision::BlockTracker
        );
    }

    #[test]
    fn suffix_must_be_a_subdomain() {
        let f = RequestFilter::new(&["ads.example".to_string()], 0.0);
        assert!(f.is_tracker("https://cdn.ads.example/a.js"));
        assert!(!f.is_tracker("https://badads.example/a.js"));
    }

    #[test]
    fn droppable_resources_follow_the_roll() {
        let f = RequestFilter::new(&[], 0.4);
        let img = "https://cdn.shop.ir/a.jpg";
        assert_eq!(f.decide_with_roll(img, ResourceKind::Image, 0.1), FilterDecision::DropResource);
        assert_eq!(f.decide_with_roll(img, ResourceKind::Image, 0.6), FilterDecision::Allow);
        assert_eq!(
            f.decide_with_roll("https://shop.ir/", ResourceKind::Document, 0.0),
            FilterDecision::Allow
        );
    }

    #[test]
    fn cdp_names() {
        assert_eq!(ResourceKind::from_cdp("Stylesheet"), ResourceKind::Stylesheet);
        assert_eq!(ResourceKind::from_cdp("Fetch"), ResourceKind::Xhr);
        assert_eq!(ResourceKind::from_cdp("WebSocket"), ResourceKind::Other);
    }
}
