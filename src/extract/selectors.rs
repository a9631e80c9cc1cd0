//! Primary extraction path: profile selectors applied to list containers.

use scraper::{ElementRef, Html, Selector};

use crate::config::SelectorSet;
use crate::error::ConfigError;
use crate::models::CandidateRecord;

use super::text::collapse_whitespace;
use super::urls::first_srcset_url;

/// Lazy-loading attributes checked after `src`, in order.
const IMAGE_ATTRS: &[&str] = &["data-src", "data-lazy-src", "data-original"];

/// A profile's selector set, parsed once per profile.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    list: Selector,
    title: Selector,
    price: Selector,
    link: Option<Selector>,
    image: Option<Selector>,
    availability: Option<Selector>,
    fallback_link: Selector,
    fallback_image: Selector,
}

impl CompiledSelectors {
    pub fn compile(domain: &str, set: &SelectorSet) -> Result<Self, ConfigError> {
        let required = |role: &str, value: &Option<String>| -> Result<Selector, ConfigError> {
            let raw = value
                .as_deref()
                .ok_or_else(|| ConfigError::profile(domain, format!("missing required selector `{}`", role)))?;
            parse(domain, role, raw)
        };
        let optional = |role: &str, value: &Option<String>| -> Result<Option<Selector>, ConfigError> {
            value.as_deref().map(|raw| parse(domain, role, raw)).transpose()
        };

        Ok(Self {
            list: required("list", &set.list)?,
            title: required("title", &set.title)?,
            price: required("price", &set.price)?,
            link: optional("link", &set.link)?,
            image: optional("image", &set.image)?,
            availability: optional("availability", &set.availability)?,
            fallback_link: parse(domain, "link", "a[href]")?,
            fallback_image: parse(domain, "image", "img")?,
        })
    }

    /// One candidate per list container, in document order.
    pub fn candidates(&self, document: &Html) -> Vec<CandidateRecord> {
        document
            .select(&self.list)
            .map(|container| self.candidate(container))
            .collect()
    }

    fn candidate(&self, container: ElementRef<'_>) -> CandidateRecord {
        let title_raw = first_text(container, &self.title).or_else(|| {
            container
                .select(&self.title)
                .next()
                .and_then(|el| el.value().attr("title").map(str::to_string))
        });

        let link_raw = match &self.link {
            Some(sel) => container
                .select(sel)
                .find_map(|el| el.value().attr("href").map(str::to_string)),
            None => container
                .value()
                .attr("href")
                .map(str::to_string)
                .or_else(|| {
                    container
                        .select(&self.fallback_link)
                        .find_map(|el| el.value().attr("href").map(str::to_string))
                }),
        };

        let image_raw = self
            .image
            .as_ref()
            .and_then(|sel| container.select(sel).find_map(image_source))
            .or_else(|| container.select(&self.fallback_image).find_map(image_source));

        CandidateRecord {
            title_raw,
            price_text_raw: first_text(container, &self.price),
            link_raw,
            image_raw,
            availability_text_raw: self
                .availability
                .as_ref()
                .and_then(|sel| first_text(container, sel)),
        }
    }
}

fn parse(domain: &str, role: &str, raw: &str) -> Result<Selector, ConfigError> {
    Selector::parse(raw).map_err(|e| {
        ConfigError::profile(domain, format!("selector `{}` is not valid CSS: {:?}", role, e))
    })
}

/// Text of the first match with any non-whitespace content.
fn first_text(container: ElementRef<'_>, selector: &Selector) -> Option<String> {
    container.select(selector).find_map(|el| {
        let text = collapse_whitespace(&el.text().collect::<String>());
        (!text.is_empty()).then_some(text)
    })
}

/// Best image URL on an element, skipping inline placeholders.
fn image_source(el: ElementRef<'_>) -> Option<String> {
    let value = el.value();
    let usable = |s: &&str| !s.trim().is_empty() && !s.trim_start().starts_with("data:");

    value
        .attr("src")
        .filter(usable)
        .or_else(|| IMAGE_ATTRS.iter().find_map(|a| value.attr(a).filter(usable)))
        .or_else(|| value.attr("srcset").and_then(first_srcset_url))
        .or_else(|| value.attr("data-srcset").and_then(first_srcset_url))
        .map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> SelectorSet {
        SelectorSet {
            list: Some("div.product".into()),
            title: Some(".name".into()),
            price: Some(".price".into()),
            availability: Some(".stock".into()),
            ..Default::default()
        }
    }

    #[test]
    fn pulls_fields_from_each_container() {
        let html = Html::parse_document(
            r#"<div class="product"><a href="/p/1"><img src="data:image/gif;base64,R0" data-src="/i/1.jpg"></a>
                <h3 class="name">  گوشی   A  </h3><span class="price">۱۰۰ تومان</span><em class="stock">موجود</em></div>
               <div class="product"><h3 class="name"></h3><span class="price"></span></div>"#,
        );
        let compiled = CompiledSelectors::compile("shop.ir", &set()).unwrap();
        let candidates = compiled.candidates(&html);
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.title_raw.as_deref(), Some("گوشی A"));
        assert_eq!(first.price_text_raw.as_deref(), Some("۱۰۰ تومان"));
        assert_eq!(first.link_raw.as_deref(), Some("/p/1"));
        assert_eq!(first.image_raw.as_deref(), Some("/i/1.jpg"));
        assert_eq!(first.availability_text_raw.as_deref(), Some("موجود"));

        assert_eq!(candidates[1], CandidateRecord::default());
    }

    #[test]
    fn container_anchor_is_the_link() {
        let html = Html::parse_document(
            r#"<a class="card" href="/p/7"><b class="t">X</b><i class="p">5</i></a>"#,
        );
        let set = SelectorSet {
            list: Some("a.card".into()),
            title: Some(".t".into()),
            price: Some(".p".into()),
            ..Default::default()
        };
        let compiled = CompiledSelectors::compile("shop.ir", &set).unwrap();
        let candidates = compiled.candidates(&html);
        assert_eq!(candidates[0].link_raw.as_deref(), Some("/p/7"));
    }

    #[test]
    fn missing_required_role_fails_compile() {
        let mut s = set();
        s.list = None;
        assert!(CompiledSelectors::compile("shop.ir", &s).is_err());
    }
}
