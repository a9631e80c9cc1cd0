//! shopscrape - profile-driven product listing scraper for Iranian storefronts.
//!
//! Given declarative per-site profiles, the engine picks a fetch strategy
//! (plain HTTP, automated browser or stealth browser), drives pagination,
//! detects bot challenges, and extracts normalized product records with
//! toman/rial-aware prices. Results stream to a [`scheduler::ResultSink`];
//! each crawl cycle ends with a [`scheduler::CycleSummary`].

pub mod challenge;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod pagination;
pub mod scheduler;
pub mod stealth;

pub use config::{EngineConfig, ProfileSet, SiteProfile};
pub use error::{ConfigError, EngineError, ScrapeError};
pub use scheduler::{CycleSummary, Orchestrator};
