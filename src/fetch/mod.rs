//! Fetch strategies.
//!
//! Each driver loads a seed URL for a profile and hands back the initial
//! content plus a [`PageHandle`] for follow-up interaction (pagination,
//! challenge probing, humanized movement).

pub mod browser;
pub mod http;
mod page;
pub mod session;
mod user_agent;

use async_trait::async_trait;

pub use browser::{BrowserFetcher, BrowserHost};
pub use http::{classify_status, HttpFetcher, StaticPage};
pub use page::{ControlState, PageHandle};
pub use session::{SessionLease, SessionPool};
pub use user_agent::{UserAgentRotator, IMPERSONATE_USER_AGENTS};

use crate::config::{FetchStrategy, SiteProfile};
use crate::error::ScrapeError;

/// A loaded page.
pub struct FetchedPage {
    pub content: String,
    /// URL after redirects.
    pub final_url: String,
    /// Response status, when the driver observes one.
    pub status: Option<u16>,
    pub page: Box<dyn PageHandle>,
}

impl std::fmt::Debug for FetchedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedPage")
            .field("final_url", &self.final_url)
            .field("status", &self.status)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// A strategy for loading a seed URL.
///
/// Browser-based drivers require a session lease; the HTTP driver ignores it.
#[async_trait]
pub trait FetchDriver: Send + Sync {
    fn strategy(&self) -> FetchStrategy;

    async fn fetch(
        &self,
        url: &str,
        profile: &SiteProfile,
        session: Option<&SessionLease>,
    ) -> Result<FetchedPage, ScrapeError>;
}
