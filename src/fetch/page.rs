//! Post-load page handles.
//!
//! Every driver returns a [`PageHandle`] alongside the initial content. The
//! pagination controller, challenge detector and humanizer only talk to the
//! page through this trait, so they work the same against a live browser tab,
//! a static HTTP page, or a scripted fake in tests.

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::error::ScrapeError;

/// State of a pagination control such as a "load more" button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Missing,
    Hidden,
    Disabled,
    Ready,
}

#[async_trait]
pub trait PageHandle: Send {
    /// URL currently loaded.
    fn url(&self) -> &str;

    /// `(width, height)` of the viewport in CSS pixels.
    fn viewport(&self) -> (u32, u32) {
        (1366, 768)
    }

    /// Whether scrolling, clicking and pointer movement are available.
    fn supports_interaction(&self) -> bool {
        false
    }

    /// Current document HTML.
    async fn content(&mut self) -> Result<String, ScrapeError>;

    /// Load another URL in this page and return its HTML.
    async fn navigate(&mut self, url: &str) -> Result<String, ScrapeError>;

    async fn title(&mut self) -> Result<String, ScrapeError>;

    /// Whether an element matching `selector` exists and is rendered visibly.
    async fn is_visible(&mut self, selector: &str) -> Result<bool, ScrapeError>;

    /// Attribute of the first element matching `selector`.
    async fn attribute(&mut self, selector: &str, name: &str)
        -> Result<Option<String>, ScrapeError>;

    /// PNG bytes of the first element matching `selector`, if it can be captured.
    async fn capture_element(&mut self, _selector: &str) -> Result<Option<Vec<u8>>, ScrapeError> {
        Ok(None)
    }

    async fn scroll_height(&mut self) -> Result<u64, ScrapeError> {
        Err(ScrapeError::Unsupported("scroll_height"))
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), ScrapeError> {
        Err(ScrapeError::Unsupported("scroll_to_bottom"))
    }

    async fn scroll_by(&mut self, _dy: i64) -> Result<(), ScrapeError> {
        Err(ScrapeError::Unsupported("scroll_by"))
    }

    async fn move_pointer(&mut self, _x: f64, _y: f64) -> Result<(), ScrapeError> {
        Err(ScrapeError::Unsupported("move_pointer"))
    }

    async fn control_state(&mut self, _selector: &str) -> Result<ControlState, ScrapeError> {
        Err(ScrapeError::Unsupported("control_state"))
    }

    async fn click(&mut self, _selector: &str) -> Result<(), ScrapeError> {
        Err(ScrapeError::Unsupported("click"))
    }

    /// Release the underlying tab or connection. Further calls may fail.
    async fn close(&mut self) {}
}

/// Presence check on static HTML; there is no layout to test visibility against.
pub(crate) fn html_has_match(html: &str, selector: &str) -> Result<bool, ScrapeError> {
    let selector = Selector::parse(selector)
        .map_err(|e| ScrapeError::Parse(format!("bad selector {}: {:?}", selector, e)))?;
    Ok(Html::parse_document(html).select(&selector).next().is_some())
}

pub(crate) fn html_attribute(
    html: &str,
    selector: &str,
    name: &str,
) -> Result<Option<String>, ScrapeError> {
    let selector = Selector::parse(selector)
        .map_err(|e| ScrapeError::Parse(format!("bad selector {}: {:?}", selector, e)))?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(name).map(str::to_string)))
}

pub(crate) fn html_title(html: &str) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    Html::parse_document(html)
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
