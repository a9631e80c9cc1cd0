//! Challenge detection and delegation to a pluggable solver.
//!
//! Runs after a browser fetch and before pagination. Detection is a list of
//! signatures checked through the page handle (title markers and visible
//! elements). Solving is never attempted here: a detected challenge is handed
//! to the configured [`CaptchaSolver`], and anything it cannot solve is
//! terminal for the task.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::fetch::PageHandle;
use crate::models::{ChallengeRecord, ChallengeType, SolveOutcome};

/// External solver for detected challenges.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, challenge: &ChallengeRecord) -> SolveOutcome;
}

/// How a signature is recognised on the page.
#[derive(Debug, Clone)]
enum Probe {
    /// Case-insensitive substring of the document title.
    Title(&'static str),
    /// A visible element; optionally read the site key from an attribute.
    Element {
        selector: &'static str,
        site_key_attr: Option<&'static str>,
        capture: bool,
    },
}

#[derive(Debug, Clone)]
struct Signature {
    name: &'static str,
    challenge_type: ChallengeType,
    probe: Probe,
}

const fn element(name: &'static str, challenge_type: ChallengeType, selector: &'static str) -> Signature {
    Signature {
        name,
        challenge_type,
        probe: Probe::Element {
            selector,
            site_key_attr: None,
            capture: false,
        },
    }
}

const fn title(name: &'static str, challenge_type: ChallengeType, marker: &'static str) -> Signature {
    Signature {
        name,
        challenge_type,
        probe: Probe::Title(marker),
    }
}

/// Checked in order; image challenges first since they often sit inside a
/// script-challenge interstitial.
fn default_signatures() -> Vec<Signature> {
    use ChallengeType::{ImageChallenge, ScriptChallenge, UnknownBlocking};
    vec![
        Signature {
            name: "recaptcha",
            challenge_type: ImageChallenge,
            probe: Probe::Element {
                selector: ".g-recaptcha",
                site_key_attr: Some("data-sitekey"),
                capture: false,
            },
        },
        element("recaptcha", ImageChallenge, "iframe[src*='recaptcha']"),
        Signature {
            name: "hcaptcha",
            challenge_type: ImageChallenge,
            probe: Probe::Element {
                selector: ".h-captcha",
                site_key_attr: Some("data-sitekey"),
                capture: false,
            },
        },
        element("hcaptcha", ImageChallenge, "iframe[src*='hcaptcha']"),
        Signature {
            name: "image-captcha",
            challenge_type: ImageChallenge,
            probe: Probe::Element {
                selector: "img[src*='captcha'], img#captcha, #captcha-image",
                site_key_attr: None,
                capture: true,
            },
        },
        element("cloudflare", ScriptChallenge, "#challenge-form"),
        element("cloudflare", ScriptChallenge, "#challenge-stage"),
        element("cloudflare", ScriptChallenge, ".cf-browser-verification"),
        element("cloudflare", ScriptChallenge, "iframe[src*='challenges.cloudflare.com']"),
        title("cloudflare", ScriptChallenge, "just a moment"),
        title("cloudflare", ScriptChallenge, "attention required"),
        element("arvancloud", ScriptChallenge, "#arvan-challenge"),
        title("arvancloud", ScriptChallenge, "arvancloud"),
        title("js-check", ScriptChallenge, "checking your browser"),
        title("js-check", ScriptChallenge, "در حال بررسی مرورگر"),
        title("denied", UnknownBlocking, "access denied"),
        title("denied", UnknownBlocking, "403 forbidden"),
        title("denied", UnknownBlocking, "request blocked"),
        title("denied", UnknownBlocking, "دسترسی غیرمجاز"),
    ]
}

/// Inspects page state for known challenge patterns.
#[derive(Debug, Clone)]
pub struct ChallengeDetector {
    signatures: Vec<Signature>,
}

impl Default for ChallengeDetector {
    fn default() -> Self {
        Self {
            signatures: default_signatures(),
        }
    }
}

impl ChallengeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// First matching signature as a [`ChallengeRecord`], or `None`.
    ///
    /// A probe that the page cannot answer counts as "not present".
    pub async fn detect(&self, page: &mut dyn PageHandle) -> Option<ChallengeRecord> {
        let page_title = match page.title().await {
            Ok(t) => t.to_lowercase(),
            Err(e) => {
                debug!("Title unavailable for challenge check: {}", e);
                String::new()
            }
        };

        for signature in &self.signatures {
            match &signature.probe {
                Probe::Title(marker) => {
                    if !page_title.is_empty() && page_title.contains(&marker.to_lowercase()) {
                        return Some(ChallengeRecord::new(
                            signature.challenge_type,
                            page.url(),
                            signature.name,
                        ));
                    }
                }
                Probe::Element {
                    selector,
                    site_key_attr,
                    capture,
                } => {
                    match page.is_visible(selector).await {
                        Ok(true) => {}
                        Ok(false) => continue,
                        Err(e) => {
                            debug!("Probe {} failed: {}", selector, e);
                            continue;
                        }
                    }
                    let mut record = ChallengeRecord::new(
                        signature.challenge_type,
                        page.url(),
                        signature.name,
                    );
                    record.selector = Some(selector.to_string());
                    if let Some(attr) = site_key_attr {
                        record.site_key = page.attribute(selector, attr).await.ok().flatten();
                    }
                    if *capture {
                        record.image = page.capture_element(selector).await.ok().flatten();
                    }
                    return Some(record);
                }
            }
        }
        None
    }
}

/// Result of running the detector and, if needed, the solver.
#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeVerdict {
    Clear,
    Resolved(ChallengeRecord),
    Unresolved(ChallengeRecord),
}

/// Detector plus optional solver.
#[derive(Clone, Default)]
pub struct ChallengeGate {
    detector: ChallengeDetector,
    solver: Option<Arc<dyn CaptchaSolver>>,
}

impl ChallengeGate {
    pub fn new(solver: Option<Arc<dyn CaptchaSolver>>) -> Self {
        Self {
            detector: ChallengeDetector::new(),
            solver,
        }
    }

    pub async fn check(&self, page: &mut dyn PageHandle) -> ChallengeVerdict {
        let Some(mut record) = self.detector.detect(page).await else {
            return ChallengeVerdict::Clear;
        };
        info!(
            "Detected {} ({}) on {}",
            record.challenge_type.as_str(),
            record.signature,
            record.page_url
        );

        let Some(solver) = &self.solver else {
            warn!("No solver configured for {} challenge", record.challenge_type.as_str());
            return ChallengeVerdict::Unresolved(record);
        };
        match solver.solve(&record).await {
            SolveOutcome::Solved => {
                record.resolved = true;
                ChallengeVerdict::Resolved(record)
            }
            SolveOutcome::Unsolved => ChallengeVerdict::Unresolved(record),
        }
    }
}
