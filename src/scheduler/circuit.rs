//! Per-vendor circuit breaker.
//!
//! Closed → Open after N consecutive denial failures (blocked or unresolved
//! challenge). Open → HalfOpen once the cool-down elapses; HalfOpen admits
//! exactly one probe task whose result closes or re-opens the circuit.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::models::FailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum VendorCircuitState {
    Closed { denials: u32 },
    Open { until: Instant },
    HalfOpen { probe_in_flight: bool },
}

impl Default for VendorCircuitState {
    fn default() -> Self {
        Self::Closed { denials: 0 }
    }
}

/// Whether a task may run against the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// The single half-open probe.
    Probe,
    Rejected,
}

impl Admission {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    vendors: Mutex<HashMap<String, VendorCircuitState>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            vendors: Mutex::new(HashMap::new()),
        }
    }

    pub async fn admit(&self, vendor: &str) -> Admission {
        let mut vendors = self.vendors.lock().await;
        let state = vendors.entry(vendor.to_string()).or_default();
        match *state {
            VendorCircuitState::Closed { .. } => Admission::Allowed,
            VendorCircuitState::Open { until } => {
                if Instant::now() >= until {
                    info!("Circuit for {} half-open, admitting probe", vendor);
                    *state = VendorCircuitState::HalfOpen {
                        probe_in_flight: true,
                    };
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
            VendorCircuitState::HalfOpen { probe_in_flight } => {
                if probe_in_flight {
                    Admission::Rejected
                } else {
                    *state = VendorCircuitState::HalfOpen {
                        probe_in_flight: true,
                    };
                    Admission::Probe
                }
            }
        }
    }

    /// Record a finished task. `failure` is `None` for success.
    ///
    /// Failures that are not denials leave a closed circuit's streak as is.
    /// Any failure of the half-open probe re-opens the circuit.
    pub async fn record(&self, vendor: &str, failure: Option<FailureKind>) {
        let mut vendors = self.vendors.lock().await;
        let state = vendors.entry(vendor.to_string()).or_default();
        let next = match (*state, failure) {
            (VendorCircuitState::HalfOpen { .. }, None) => {
                info!("Circuit for {} closed after successful probe", vendor);
                VendorCircuitState::Closed { denials: 0 }
            }
            (VendorCircuitState::HalfOpen { .. }, Some(kind)) => {
                warn!("Probe for {} failed ({}), circuit re-opened", vendor, kind);
                self.open()
            }
            (VendorCircuitState::Closed { .. }, None) => VendorCircuitState::Closed { denials: 0 },
            (VendorCircuitState::Closed { denials }, Some(kind)) if kind.trips_circuit() => {
                let denials = denials + 1;
                if denials >= self.threshold {
                    warn!(
                        "Circuit for {} opened after {} consecutive {} failures",
                        vendor, denials, kind
                    );
                    self.open()
                } else {
                    VendorCircuitState::Closed { denials }
                }
            }
            (current, _) => current,
        };
        *state = next;
    }

    fn open(&self) -> VendorCircuitState {
        VendorCircuitState::Open {
            until: Instant::now() + self.cooldown,
        }
    }

    pub async fn status(&self, vendor: &str) -> CircuitStatus {
        let vendors = self.vendors.lock().await;
        match vendors.get(vendor).copied().unwrap_or_default() {
            VendorCircuitState::Closed { .. } => CircuitStatus::Closed,
            VendorCircuitState::Open { .. } => CircuitStatus::Open,
            VendorCircuitState::HalfOpen { .. } => CircuitStatus::HalfOpen,
        }
    }
}
