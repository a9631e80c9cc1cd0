//! URL resolution against the page a record came from.

use url::Url;

/// Resolve a possibly-relative reference against `base_url`.
///
/// Returns `None` for empty references and for schemes a product link can
/// never use (`javascript:`, `data:`, `mailto:`, `tel:`).
pub fn resolve_url(base_url: &str, path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() || path == "#" {
        return None;
    }
    let lower = path.to_ascii_lowercase();
    if ["javascript:", "data:", "mailto:", "tel:"]
        .iter()
        .any(|s| lower.starts_with(s))
    {
        return None;
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Url::parse(path).ok().map(|u| u.to_string());
    }

    // Use proper URL joining to handle protocol-relative and dot segments
    let base = Url::parse(base_url).ok()?;
    base.join(path).ok().map(|u| u.to_string())
}

/// First candidate URL in a `srcset` attribute.
pub fn first_srcset_url(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .filter_map(|entry| entry.split_whitespace().next())
        .find(|url| !url.is_empty())
}
