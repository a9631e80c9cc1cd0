//! Fetch attempt records and the failure taxonomy.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FetchStrategy;

/// Kinds of task failure. Circuit-open skips are not failures and live in [`FetchOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    NetworkError,
    HttpError,
    Timeout,
    Blocked,
    ChallengeUnresolved,
    ParseError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "network-error",
            Self::HttpError => "http-error",
            Self::Timeout => "timeout",
            Self::Blocked => "blocked",
            Self::ChallengeUnresolved => "challenge-unresolved",
            Self::ParseError => "parse-error",
        }
    }

    /// Failures that count toward opening a vendor's circuit.
    pub fn trips_circuit(&self) -> bool {
        matches!(self, Self::Blocked | Self::ChallengeUnresolved)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of one fetch attempt, or of a task that never attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchOutcome {
    Success,
    NetworkError,
    HttpError,
    Timeout,
    Blocked,
    ChallengeUnresolved,
    ParseError,
    CircuitOpen,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// The failure kind, if this outcome is an execution failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::NetworkError => Some(FailureKind::NetworkError),
            Self::HttpError => Some(FailureKind::HttpError),
            Self::Timeout => Some(FailureKind::Timeout),
            Self::Blocked => Some(FailureKind::Blocked),
            Self::ChallengeUnresolved => Some(FailureKind::ChallengeUnresolved),
            Self::ParseError => Some(FailureKind::ParseError),
            Self::Success | Self::CircuitOpen => None,
        }
    }
}

impl From<FailureKind> for FetchOutcome {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::NetworkError => Self::NetworkError,
            FailureKind::HttpError => Self::HttpError,
            FailureKind::Timeout => Self::Timeout,
            FailureKind::Blocked => Self::Blocked,
            FailureKind::ChallengeUnresolved => Self::ChallengeUnresolved,
            FailureKind::ParseError => Self::ParseError,
        }
    }
}

/// One finalized fetch attempt for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchAttempt {
    pub strategy_used: FetchStrategy,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Status code, when the driver saw one.
    pub http_status: Option<u16>,
    pub outcome: FetchOutcome,
    /// Zero for the first attempt of a task.
    pub retry_count: u32,
    /// Error text for failed attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FetchAttempt {
    /// Record of a task skipped because the vendor circuit is open.
    pub fn circuit_open(strategy: FetchStrategy) -> Self {
        Self {
            strategy_used: strategy,
            started_at: Utc::now(),
            duration_ms: 0,
            http_status: None,
            outcome: FetchOutcome::CircuitOpen,
            retry_count: 0,
            detail: None,
        }
    }
}
