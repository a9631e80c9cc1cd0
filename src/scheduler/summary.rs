//! Cycle summary: per-vendor counts, failures by kind, circuit skips.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{FailureKind, FetchOutcome};

/// Aggregated result for one vendor in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VendorReport {
    pub vendor: String,
    pub tasks: u32,
    pub successes: u32,
    pub products: u64,
    pub failures: BTreeMap<FailureKind, u32>,
    pub skipped_by_circuit: u32,
    pub challenges: u32,
    /// Tasks whose pagination stopped on an error after keeping records.
    pub partial: u32,
}

impl VendorReport {
    pub fn new(vendor: &str) -> Self {
        Self {
            vendor: vendor.to_string(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: FetchOutcome, products: usize, challenge: bool, partial: bool) {
        if outcome == FetchOutcome::CircuitOpen {
            self.skipped_by_circuit += 1;
            return;
        }
        self.tasks += 1;
        self.products += products as u64;
        if challenge {
            self.challenges += 1;
        }
        if partial {
            self.partial += 1;
        }
        match outcome.failure_kind() {
            Some(kind) => *self.failures.entry(kind).or_insert(0) += 1,
            None => self.successes += 1,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.values().sum()
    }
}

/// One failed task, as listed in the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskError {
    pub vendor: String,
    pub seed_url: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub vendors: Vec<VendorReport>,
    pub errors: Vec<TaskError>,
    /// Vendors with at least one task skipped on an open circuit.
    pub skipped_by_circuit: Vec<String>,
    /// Set when resource exhaustion ended the cycle early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl CycleSummary {
    pub fn vendor(&self, domain: &str) -> Option<&VendorReport> {
        self.vendors.iter().find(|v| v.vendor == domain)
    }

    pub fn total_products(&self) -> u64 {
        self.vendors.iter().map(|v| v.products).sum()
    }

    pub fn failures_by_kind(&self) -> BTreeMap<FailureKind, u32> {
        let mut totals = BTreeMap::new();
        for vendor in &self.vendors {
            for (kind, n) in &vendor.failures {
                *totals.entry(*kind).or_insert(0) += n;
            }
        }
        totals
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}
