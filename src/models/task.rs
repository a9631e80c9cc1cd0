//! Scrape tasks and the batches handed to the result sink.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ChallengeRecord, ExtractedProduct, FetchAttempt, FetchOutcome};

/// One (profile, seed URL) pair awaiting execution in the current cycle.
#[derive(Debug, Clone)]
pub struct ScrapeTask {
    pub id: Uuid,
    pub vendor: String,
    pub seed_url: String,
    /// Position of the seed URL within its profile.
    pub seed_index: usize,
    pub attempts: Vec<FetchAttempt>,
}

impl ScrapeTask {
    pub fn new(vendor: &str, seed_url: &str, seed_index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            vendor: vendor.to_string(),
            seed_url: seed_url.to_string(),
            seed_index,
            attempts: Vec::new(),
        }
    }

    pub fn record(&mut self, attempt: FetchAttempt) {
        self.attempts.push(attempt);
    }

    /// Outcome of the latest attempt.
    pub fn last_outcome(&self) -> Option<FetchOutcome> {
        self.attempts.last().map(|a| a.outcome)
    }
}

/// Everything one completed task hands downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBatch {
    pub task_id: Uuid,
    pub vendor: String,
    pub seed_url: String,
    pub outcome: FetchOutcome,
    /// Products in extraction order, deduplicated by product URL.
    pub products: Vec<ExtractedProduct>,
    pub attempts: Vec<FetchAttempt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<ChallengeRecord>,
    /// Pagination stopped early on a step failure; products are partial.
    #[serde(default)]
    pub partial: bool,
}
