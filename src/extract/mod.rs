//! Extraction pipeline: raw page content to normalized product records.
//!
//! The selector path runs first. When it yields no qualifying record the
//! pipeline falls back to embedded JSON-LD product data. Both paths produce
//! [`CandidateRecord`]s that go through the same normalization, so a record
//! only leaves here with a title and a parsed price.

mod availability;
mod price;
mod selectors;
mod structured;
mod text;
mod urls;

pub use availability::parse_availability;
pub use price::{parse_price, TOMAN_MAGNITUDE_THRESHOLD};
pub use selectors::CompiledSelectors;
pub use structured::structured_candidates;
pub use text::{normalize_digits, normalize_text};
pub use urls::resolve_url;

use chrono::{DateTime, Utc};
use scraper::Html;
use serde::Serialize;
use tracing::debug;

use crate::config::SiteProfile;
use crate::error::{ConfigError, ScrapeError};
use crate::models::{CandidateRecord, ExtractedProduct};

/// Where one page's records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionPath {
    Selectors,
    StructuredData,
    /// Neither path produced a qualifying record.
    Empty,
}

/// Provenance stamped onto every record of one page.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    pub source_url: String,
    pub vendor: String,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionContext {
    pub fn new(source_url: &str, vendor: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            vendor: vendor.to_string(),
            extracted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub products: Vec<ExtractedProduct>,
    /// List items located on the page, before discarding.
    pub candidates: usize,
    pub discarded: usize,
    pub path: ExtractionPath,
}

/// Per-profile extraction pipeline.
#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    selectors: CompiledSelectors,
}

impl ExtractionPipeline {
    pub fn for_profile(profile: &SiteProfile) -> Result<Self, ConfigError> {
        Ok(Self {
            selectors: CompiledSelectors::compile(&profile.domain, &profile.selectors)?,
        })
    }

    /// Extract products from one page.
    ///
    /// Deterministic: the same content and context always produce the same
    /// records. Empty content is a parse error; a page without products is not.
    pub fn extract(
        &self,
        content: &str,
        ctx: &ExtractionContext,
    ) -> Result<ExtractionReport, ScrapeError> {
        if content.trim().is_empty() {
            return Err(ScrapeError::Parse(format!(
                "empty page content from {}",
                ctx.source_url
            )));
        }
        let document = Html::parse_document(content);

        let primary = self.selectors.candidates(&document);
        let primary_count = primary.len();
        let (products, discarded) = normalize_all(primary, ctx);
        if !products.is_empty() {
            return Ok(ExtractionReport {
                products,
                candidates: primary_count,
                discarded,
                path: ExtractionPath::Selectors,
            });
        }

        let fallback = structured_candidates(&document);
        let fallback_count = fallback.len();
        let (products, fallback_discarded) = normalize_all(fallback, ctx);
        if !products.is_empty() {
            debug!(
                "{}: selectors matched nothing usable, took {} product(s) from JSON-LD",
                ctx.vendor,
                products.len()
            );
            return Ok(ExtractionReport {
                products,
                candidates: fallback_count,
                discarded: fallback_discarded,
                path: ExtractionPath::StructuredData,
            });
        }

        Ok(ExtractionReport {
            products: Vec::new(),
            candidates: primary_count,
            discarded,
            path: ExtractionPath::Empty,
        })
    }
}

fn normalize_all(
    candidates: Vec<CandidateRecord>,
    ctx: &ExtractionContext,
) -> (Vec<ExtractedProduct>, usize) {
    let total = candidates.len();
    let products: Vec<ExtractedProduct> = candidates
        .into_iter()
        .filter_map(|c| normalize_candidate(c, ctx))
        .collect();
    let discarded = total - products.len();
    (products, discarded)
}

/// Normalize one candidate; `None` when it lacks a title or a price.
pub fn normalize_candidate(
    candidate: CandidateRecord,
    ctx: &ExtractionContext,
) -> Option<ExtractedProduct> {
    let title_localized = text::collapse_whitespace(candidate.title_raw.as_deref()?);
    let title = normalize_text(&title_localized);
    if title.is_empty() {
        return None;
    }
    let price = parse_price(candidate.price_text_raw.as_deref()?)?;

    let product_url = candidate
        .link_raw
        .as_deref()
        .and_then(|link| resolve_url(&ctx.source_url, link))
        .unwrap_or_else(|| ctx.source_url.clone());
    let image_url = candidate
        .image_raw
        .as_deref()
        .and_then(|img| resolve_url(&ctx.source_url, img));

    Some(ExtractedProduct {
        title,
        title_localized,
        price_minor: price.rial,
        currency_hint: price.natural,
        price,
        availability: parse_availability(candidate.availability_text_raw.as_deref()),
        product_url,
        image_url,
        vendor: ctx.vendor.clone(),
        source_url: ctx.source_url.clone(),
        extracted_at: ctx.extracted_at,
    })
}
