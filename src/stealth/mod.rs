//! Anti-detection subsystem, consumed by the browser-based drivers.
//!
//! These are heuristics that lower the odds of being flagged as automated
//! traffic. None of them guarantee a page will load.

mod filter;
mod fingerprint;
mod humanize;
mod proxy;
mod scripts;

pub use filter::{FilterDecision, RequestFilter, ResourceKind, TRACKER_DOMAINS};
pub use fingerprint::{
    create_strategy, AntiDetectionProfile, FingerprintPool, RandomSelection, RoundRobinSelection,
    SelectionStrategy, FINGERPRINTS,
};
pub use humanize::{bezier_path, Humanizer, InteractionPlan, PointerStep, ScrollStep};
pub(crate) use humanize::pause;
pub use proxy::{ProxyEndpoint, ProxyManager, StaticProxyPool};
pub use scripts::{automation_flag_script, stealth_scripts};
