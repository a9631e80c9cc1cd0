//! Challenge records handed to an external solver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeType {
    None,
    /// Interactive JavaScript check (Cloudflare, ArvanCloud, ...).
    ScriptChallenge,
    /// Image or widget captcha (reCAPTCHA, hCaptcha, inline captcha image).
    ImageChallenge,
    /// Generic denial page with no solvable component.
    UnknownBlocking,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ScriptChallenge => "script-challenge",
            Self::ImageChallenge => "image-challenge",
            Self::UnknownBlocking => "unknown-blocking",
        }
    }
}

/// A detected challenge on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub challenge_type: ChallengeType,
    pub detected_at: DateTime<Utc>,
    pub resolved: bool,
    pub page_url: String,
    /// Name of the signature that fired.
    pub signature: String,
    /// Selector locating the challenge widget, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Captcha site key scraped from the widget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_key: Option<String>,
    /// Raw captcha image bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
}

impl ChallengeRecord {
    pub fn new(challenge_type: ChallengeType, page_url: &str, signature: &str) -> Self {
        Self {
            challenge_type,
            detected_at: Utc::now(),
            resolved: false,
            page_url: page_url.to_string(),
            signature: signature.to_string(),
            selector: None,
            site_key: None,
            image: None,
        }
    }
}

/// Answer from a captcha solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Solved,
    Unsolved,
}
