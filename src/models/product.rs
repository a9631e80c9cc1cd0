//! Candidate and normalized product records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed ratio between the two denominations.
pub const RIALS_PER_TOMAN: i64 = 10;

/// Currency denomination a price was quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Denomination {
    Rial,
    Toman,
}

/// A parsed amount carrying both denominations.
///
/// `natural` names the denomination the page quoted (or the heuristic chose);
/// the other amount is always derived from it through [`RIALS_PER_TOMAN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    pub natural: Denomination,
    pub rial: i64,
    pub toman: i64,
}

impl Price {
    pub fn from_natural(amount: i64, natural: Denomination) -> Self {
        match natural {
            Denomination::Toman => Self {
                natural,
                rial: amount * RIALS_PER_TOMAN,
                toman: amount,
            },
            Denomination::Rial => Self {
                natural,
                rial: amount,
                toman: amount / RIALS_PER_TOMAN,
            },
        }
    }

    /// Amount in the quoted denomination.
    pub fn natural_amount(&self) -> i64 {
        match self.natural {
            Denomination::Toman => self.toman,
            Denomination::Rial => self.rial,
        }
    }

    /// Amount in the other denomination.
    pub fn derived_amount(&self) -> i64 {
        match self.natural {
            Denomination::Toman => self.rial,
            Denomination::Rial => self.toman,
        }
    }
}

/// Raw fields pulled from one list item before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateRecord {
    pub title_raw: Option<String>,
    pub price_text_raw: Option<String>,
    pub link_raw: Option<String>,
    pub image_raw: Option<String>,
    pub availability_text_raw: Option<String>,
}

/// A normalized product ready for the downstream pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProduct {
    /// Normalized title: ASCII digits, unified letter forms, collapsed whitespace.
    pub title: String,
    /// Title text as it appeared on the page.
    pub title_localized: String,
    /// Price in the smallest subunit (rial).
    pub price_minor: i64,
    pub currency_hint: Denomination,
    pub price: Price,
    pub availability: bool,
    pub product_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub vendor: String,
    pub source_url: String,
    pub extracted_at: DateTime<Utc>,
}
