//! Cycle metrics: attempts, outcomes, products and challenges.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

use super::CycleSummary;
use crate::models::{ChallengeType, FailureKind, FetchAttempt};

/// Counters accumulated over one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: BTreeMap<FailureKind, u64>,
    pub products: BTreeMap<String, u64>,
    pub challenges: BTreeMap<ChallengeType, u64>,
}

impl MetricsSnapshot {
    fn attempt(&mut self, attempt: &FetchAttempt) {
        self.attempts += 1;
        if attempt.outcome.is_success() {
            self.successes += 1;
        } else if let Some(kind) = attempt.outcome.failure_kind() {
            *self.failures.entry(kind).or_insert(0) += 1;
        }
    }
}

pub trait MetricsSink: Send + Sync {
    fn record_attempt(&self, vendor: &str, attempt: &FetchAttempt);
    fn record_products(&self, vendor: &str, count: usize);
    fn record_challenge(&self, vendor: &str, challenge_type: ChallengeType);
    /// End of cycle. Implementations reset their counters.
    fn flush(&self, summary: &CycleSummary);
}

fn lock(m: &Mutex<MetricsSnapshot>) -> std::sync::MutexGuard<'_, MetricsSnapshot> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Logs the cycle's counters at flush.
#[derive(Debug, Default)]
pub struct TracingMetrics {
    current: Mutex<MetricsSnapshot>,
}

impl TracingMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for TracingMetrics {
    fn record_attempt(&self, _vendor: &str, attempt: &FetchAttempt) {
        lock(&self.current).attempt(attempt);
    }

    fn record_products(&self, vendor: &str, count: usize) {
        *lock(&self.current)
            .products
            .entry(vendor.to_string())
            .or_insert(0) += count as u64;
    }

    fn record_challenge(&self, _vendor: &str, challenge_type: ChallengeType) {
        *lock(&self.current).challenges.entry(challenge_type).or_insert(0) += 1;
    }

    fn flush(&self, summary: &CycleSummary) {
        let snapshot = std::mem::take(&mut *lock(&self.current));
        info!(
            attempts = snapshot.attempts,
            successes = snapshot.successes,
            products = summary.total_products(),
            duration_ms = summary.duration_ms,
            "Cycle metrics"
        );
        for (kind, n) in &snapshot.failures {
            info!(kind = kind.as_str(), count = n, "Failures");
        }
        for (vendor, n) in &snapshot.products {
            info!(vendor = vendor.as_str(), products = n, "Products");
        }
        for (challenge, n) in &snapshot.challenges {
            info!(challenge = challenge.as_str(), count = n, "Challenges");
        }
    }
}

/// Keeps flushed snapshots for inspection.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    current: Mutex<MetricsSnapshot>,
    flushed: Mutex<Vec<MetricsSnapshot>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots of every flushed cycle, oldest first.
    pub fn flushed(&self) -> Vec<MetricsSnapshot> {
        self.flushed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn current(&self) -> MetricsSnapshot {
        lock(&self.current).clone()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_attempt(&self, _vendor: &str, attempt: &FetchAttempt) {
        lock(&self.current).attempt(attempt);
    }

    fn record_products(&self, vendor: &str, count: usize) {
        *lock(&self.current)
            .products
            .entry(vendor.to_string())
            .or_insert(0) += count as u64;
    }

    fn record_challenge(&self, _vendor: &str, challenge_type: ChallengeType) {
        *lock(&self.current).challenges.entry(challenge_type).or_insert(0) += 1;
    }

    fn flush(&self, _summary: &CycleSummary) {
        let snapshot = std::mem::take(&mut *lock(&self.current));
        self.flushed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(snapshot);
    }
}
