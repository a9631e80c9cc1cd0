//! Keyword classification of stock state.

use super::text::normalize_text;

/// Checked first; several contain an "available" keyword as a substring.
const UNAVAILABLE: &[&str] = &[
    "ناموجود",
    "اتمام موجودی",
    "موجود نیست",
    "موجود نمی باشد",
    "موجود نمی‌باشد",
    "توقف تولید",
    "به زودی",
    "بزودی",
    "out of stock",
    "outofstock",
    "sold out",
    "soldout",
    "unavailable",
    "discontinued",
];

const AVAILABLE: &[&str] = &[
    "موجود",
    "افزودن به سبد",
    "خرید",
    "in stock",
    "instock",
    "available",
    "add to cart",
];

/// Classify availability text; no text or no keyword means available.
pub fn parse_availability(raw: Option<&str>) -> bool {
    let Some(raw) = raw else {
        return true;
    };
    let text = normalize_text(raw).to_lowercase();
    if UNAVAILABLE.iter().any(|k| text.contains(k)) {
        return false;
    }
    if AVAILABLE.iter().any(|k| text.contains(k)) {
        return true;
    }
    true
}
