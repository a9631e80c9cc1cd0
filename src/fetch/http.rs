//! Lightweight HTTP driver: one request, no JavaScript.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::page::{html_attribute, html_has_match, html_title};
use super::user_agent::UserAgentRotator;
use super::{FetchDriver, FetchedPage, PageHandle, SessionLease};
use crate::config::{FetchStrategy, SiteProfile};
use crate::error::ScrapeError;

/// Body markers that turn a 403/503 into an explicit denial.
const DENIAL_MARKERS: &[&str] = &[
    "access denied",
    "attention required",
    "just a moment",
    "cf-chl",
    "captcha",
    "arvancloud",
    "request blocked",
    "دسترسی غیرمجاز",
    "دسترسی شما مسدود",
];

const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "fa-IR,fa;q=0.9,en-US;q=0.8,en;q=0.7";

struct HttpInner {
    client: Client,
    /// Keeps cookies across requests, for vendors that need a session.
    session_client: Client,
    user_agents: UserAgentRotator,
    permits: Semaphore,
}

/// Plain HTTP fetch strategy.
#[derive(Clone)]
pub struct HttpFetcher {
    inner: Arc<HttpInner>,
}

impl HttpFetcher {
    /// `max_in_flight` caps concurrent requests independently of the browser cap.
    pub fn new(timeout: Duration, max_in_flight: usize) -> Result<Self, ScrapeError> {
        let build = |cookies: bool| {
            Client::builder()
                .timeout(timeout)
                .gzip(true)
                .brotli(true)
                .cookie_store(cookies)
                .build()
                .map_err(|e| ScrapeError::Network(format!("Failed to create HTTP client: {}", e)))
        };
        Ok(Self {
            inner: Arc::new(HttpInner {
                client: build(false)?,
                session_client: build(true)?,
                user_agents: UserAgentRotator::new(),
                permits: Semaphore::new(max_in_flight.max(1)),
            }),
        })
    }
}

impl HttpInner {
    fn headers(&self, extra: &BTreeMap<String, String>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
        headers.insert(USER_AGENT, HeaderValue::from_static(self.user_agents.next()));
        for (name, value) in extra {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Skipping invalid header {}", name),
            }
        }
        headers
    }

    /// GET `url` and return `(status, final_url, body)` for a 2xx response.
    async fn get(
        &self,
        url: &str,
        domain: &str,
        extra: &BTreeMap<String, String>,
        session: bool,
    ) -> Result<(u16, String, String), ScrapeError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ScrapeError::ResourceExhausted("HTTP permits closed".to_string()))?;

        let start = Instant::now();
        let client = if session {
            &self.session_client
        } else {
            &self.client
        };
        let response = client
            .get(url)
            .headers(self.headers(extra))
            .send()
            .await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;
        debug!(
            "GET {} -> {} ({} bytes, {}ms)",
            url,
            status,
            body.len(),
            start.elapsed().as_millis()
        );

        classify_status(status, &final_url, domain, &body)?;
        Ok((status, final_url, body))
    }
}

/// Map a non-2xx response onto the failure taxonomy.
pub fn classify_status(status: u16, url: &str, domain: &str, body: &str) -> Result<(), ScrapeError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    if status == 429 {
        return Err(ScrapeError::Blocked {
            domain: domain.to_string(),
            reason: "429 Too Many Requests".to_string(),
        });
    }
    if status == 403 || status == 503 {
        let lower = body.to_lowercase();
        if let Some(marker) = DENIAL_MARKERS.iter().find(|m| lower.contains(*m)) {
            return Err(ScrapeError::Blocked {
                domain: domain.to_string(),
                reason: format!("{} with denial marker \"{}\"", status, marker),
            });
        }
    }
    Err(ScrapeError::Http {
        status,
        url: url.to_string(),
    })
}

#[async_trait]
impl FetchDriver for HttpFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Http
    }

    async fn fetch(
        &self,
        url: &str,
        profile: &SiteProfile,
        _session: Option<&SessionLease>,
    ) -> Result<FetchedPage, ScrapeError> {
        let (status, final_url, content) =
            self.inner
                .get(url, &profile.domain, &profile.extra_headers, profile.requires_session)
                .await?;
        let page = StaticPage {
            inner: self.inner.clone(),
            domain: profile.domain.clone(),
            headers: profile.extra_headers.clone(),
            session: profile.requires_session,
            url: final_url.clone(),
            content: content.clone(),
        };
        Ok(FetchedPage {
            content,
            final_url,
            status: Some(status),
            page: Box::new(page),
        })
    }
}

/// Page handle over a fetched document. Navigation issues a new request.
pub struct StaticPage {
    inner: Arc<HttpInner>,
    domain: String,
    headers: BTreeMap<String, String>,
    session: bool,
    url: String,
    content: String,
}

#[async_trait]
impl PageHandle for StaticPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn content(&mut self) -> Result<String, ScrapeError> {
        Ok(self.content.clone())
    }

    async fn navigate(&mut self, url: &str) -> Result<String, ScrapeError> {
        let (_, final_url, content) = self
            .inner
            .get(url, &self.domain, &self.headers, self.session)
            .await?;
        self.url = final_url;
        self.content = content.clone();
        Ok(content)
    }

    async fn title(&mut self) -> Result<String, ScrapeError> {
        Ok(html_title(&self.content))
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, ScrapeError> {
        html_has_match(&self.content, selector)
    }

    async fn attribute(
        &mut self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, ScrapeError> {
        html_attribute(&self.content, selector, name)
    }
}
