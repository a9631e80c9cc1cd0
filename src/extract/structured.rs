//! Fallback extraction path: schema.org Product data embedded as JSON-LD.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use crate::models::CandidateRecord;

/// Candidates from every `application/ld+json` block in the document.
///
/// Blocks that fail to parse are skipped; vendors frequently ship malformed
/// JSON-LD next to valid blocks.
pub fn structured_candidates(document: &Html) -> Vec<CandidateRecord> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => collect(&value, &mut out),
            Err(e) => debug!("Skipping malformed JSON-LD block: {}", e),
        }
    }
    out
}

fn collect(value: &Value, out: &mut Vec<CandidateRecord>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                collect(graph, out);
            }
            if has_type(value, "Product") {
                out.push(product_candidate(value));
            } else if has_type(value, "ItemList") {
                if let Some(Value::Array(elements)) = map.get("itemListElement") {
                    for element in elements {
                        // ListItem wraps the product in `item`; some vendors inline it.
                        let item = element.get("item").unwrap_or(element);
                        if has_type(item, "Product") {
                            out.push(product_candidate(item));
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn has_type(value: &Value, wanted: &str) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => type_matches(t, wanted),
        Some(Value::Array(types)) => types
            .iter()
            .any(|t| t.as_str().is_some_and(|t| type_matches(t, wanted))),
        _ => false,
    }
}

fn type_matches(t: &str, wanted: &str) -> bool {
    t == wanted || t.rsplit('/').next() == Some(wanted)
}

fn product_candidate(product: &Value) -> CandidateRecord {
    let offer = first_offer(product);

    let price_text_raw = offer.and_then(|o| {
        let amount = o
            .get("price")
            .or_else(|| o.get("lowPrice"))
            .and_then(scalar_text)?;
        let unit = match o.get("priceCurrency").and_then(Value::as_str) {
            Some(c) if c.eq_ignore_ascii_case("IRR") => " ریال",
            Some(c) if c.eq_ignore_ascii_case("IRT") || c.eq_ignore_ascii_case("TOMAN") => " تومان",
            _ => "",
        };
        Some(format!("{}{}", amount, unit))
    });

    CandidateRecord {
        title_raw: product.get("name").and_then(scalar_text),
        price_text_raw,
        link_raw: product
            .get("url")
            .and_then(Value::as_str)
            .or_else(|| offer.and_then(|o| o.get("url")).and_then(Value::as_str))
            .map(str::to_string),
        image_raw: product.get("image").and_then(image_url),
        availability_text_raw: offer
            .and_then(|o| o.get("availability"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn first_offer(product: &Value) -> Option<&Value> {
    match product.get("offers")? {
        Value::Array(offers) => offers.first(),
        offer @ Value::Object(_) => Some(offer),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn image_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(image_url),
        Value::Object(map) => map.get("url").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_products_from_graph_and_item_list() {
        let html = Html::parse_document(
            r#"<html><head>
            <script type="application/ld+json">{"@context":"https://schema.org","@graph":[
              {"@type":"WebSite","name":"shop"},
              {"@type":"Product","name":"هدفون","url":"/p/1","image":["/i/1.jpg"],
               "offers":{"@type":"Offer","price":"1250000","priceCurrency":"IRR","availability":"https://schema.org/InStock"}}
            ]}</script>
            <script type="application/ld+json">{"@type":"ItemList","itemListElement":[
              {"@type":"ListItem","position":1,"item":{"@type":"Product","name":"کیبورد","offers":[{"price":990000,"priceCurrency":"IRT"}]}}
            ]}</script>
            <script type="application/ld+json">{ not json </script>
            </head></html>"#,
        );
        let candidates = structured_candidates(&html);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title_raw.as_deref(), Some("هدفون"));
        assert_eq!(candidates[0].price_text_raw.as_deref(), Some("1250000 ریال"));
        assert_eq!(candidates[0].image_raw.as_deref(), Some("/i/1.jpg"));
        assert_eq!(candidates[1].price_text_raw.as_deref(), Some("990000 تومان"));
        assert_eq!(candidates[1].link_raw, None);
    }

    #[test]
    fn aggregate_offer_low_price() {
        let html = Html::parse_document(
            r#"<script type="application/ld+json">{"@type":["Product"],"name":"x",
               "offers":{"@type":"AggregateOffer","lowPrice":45000}}</script>"#,
        );
        let candidates = structured_candidates(&html);
        assert_eq!(candidates[0].price_text_raw.as_deref(), Some("45000"));
    }
}
