//! Error types for scrape tasks, configuration loading and the cycle runner.

use thiserror::Error;

use crate::models::FailureKind;

/// Task-level failure. Every variant maps onto exactly one [`FailureKind`].
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Blocked by {domain}: {reason}")]
    Blocked { domain: String, reason: String },
    #[error("Unresolved {0} challenge")]
    ChallengeUnresolved(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Operation not supported by this page: {0}")]
    Unsupported(&'static str),
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("Resources exhausted: {0}")]
    ResourceExhausted(String),
    #[error("Cancelled")]
    Cancelled,
}

impl ScrapeError {
    /// Classify into the failure taxonomy reported in attempt logs.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) | Self::Browser(_) | Self::ResourceExhausted(_) | Self::Cancelled => {
                FailureKind::NetworkError
            }
            Self::Http { .. } => FailureKind::HttpError,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Blocked { .. } => FailureKind::Blocked,
            Self::ChallengeUnresolved(_) => FailureKind::ChallengeUnresolved,
            Self::Parse(_) | Self::Unsupported(_) => FailureKind::ParseError,
        }
    }

    /// Whether this error should abort the whole cycle rather than one task.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_))
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScrapeError::Timeout(e.to_string())
        } else if let Some(status) = e.status() {
            ScrapeError::Http {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            ScrapeError::Network(e.to_string())
        }
    }
}

#[cfg(feature = "browser")]
impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        match e {
            chromiumoxide::error::CdpError::Timeout => ScrapeError::Timeout(e.to_string()),
            other => ScrapeError::Browser(other.to_string()),
        }
    }
}

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config: {message}")]
    Format { format: &'static str, message: String },
    #[error("Profile {domain}: {message}")]
    Profile { domain: String, message: String },
    #[error("Duplicate profile for domain {0}")]
    DuplicateDomain(String),
    #[error("{0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn profile(domain: &str, message: impl Into<String>) -> Self {
        ConfigError::Profile {
            domain: domain.to_string(),
            message: message.into(),
        }
    }
}

/// Cycle-level failure surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Engine setup failed: {0}")]
    Setup(String),
    #[error("Cycle aborted: {0}")]
    Aborted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_maps_to_a_kind() {
        assert_eq!(
            ScrapeError::Network("reset".into()).kind(),
            FailureKind::NetworkError
        );
        assert_eq!(
            ScrapeError::Http {
                status: 500,
                url: "https://a.ir".into()
            }
            .kind(),
            FailureKind::HttpError
        );
        assert_eq!(
            ScrapeError::Blocked {
                domain: "a.ir".into(),
                reason: "403".into()
            }
            .kind(),
            FailureKind::Blocked
        );
        assert_eq!(
            ScrapeError::ChallengeUnresolved("script".into()).kind(),
            FailureKind::ChallengeUnresolved
        );
        assert_eq!(ScrapeError::Parse("x".into()).kind(), FailureKind::ParseError);
    }

    #[test]
    fn only_resource_exhaustion_is_fatal() {
        assert!(ScrapeError::ResourceExhausted("no browser".into()).is_fatal());
        assert!(!ScrapeError::Timeout("slow".into()).is_fatal());
        assert!(!ScrapeError::Cancelled.is_fatal());
    }
}
