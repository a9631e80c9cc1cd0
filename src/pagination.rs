//! Drives a loaded page through the profile's pagination strategy.
//!
//! Every step's content is handed to the caller as soon as it is available,
//! so records gathered before a mid-pagination failure are kept. Each
//! strategy is bounded by its profile limits regardless of what the page
//! does. Steps that load more content (page navigation, scroll, load-more
//! click) go through the same per-domain pacer as seed fetches.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{PaginationStrategy, RateLimitRange, SiteProfile};
use crate::error::ScrapeError;
use crate::extract::resolve_url;
use crate::fetch::{ControlState, PageHandle};
use crate::scheduler::DomainPacer;
use crate::stealth::{pause, Humanizer};

/// Why pagination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// Strategy `none`: only the seed page.
    SinglePage,
    /// The strategy's bound was reached.
    LimitReached,
    /// A numbered page produced zero candidates.
    EmptyPage,
    /// Scroll height did not grow.
    HeightStable,
    /// The load-more or next-page control vanished or was disabled.
    ControlGone,
    ClickFailed,
    ContentUnchanged,
    /// A step errored; see [`PaginationReport::error`].
    Failed,
}

#[derive(Debug)]
pub struct PaginationReport {
    /// Pagination steps taken after the seed page.
    pub steps: u32,
    pub stop: StopReason,
    pub error: Option<ScrapeError>,
}

impl PaginationReport {
    fn stopped(steps: u32, stop: StopReason) -> Self {
        Self {
            steps,
            stop,
            error: None,
        }
    }

    fn failed(steps: u32, error: ScrapeError) -> Self {
        Self {
            steps,
            stop: StopReason::Failed,
            error: Some(error),
        }
    }

    /// Records were kept but pagination did not finish normally.
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Callback receiving `(page_url, content)` for each step; returns the number
/// of candidate records it found.
pub type OnContent<'a> = dyn FnMut(&str, &str) -> usize + Send + 'a;

struct StepPacing<'a> {
    pacer: &'a DomainPacer,
    domain: &'a str,
    range: &'a RateLimitRange,
}

pub struct PaginationController<'a> {
    humanizer: &'a Humanizer,
    cancel: &'a CancellationToken,
    pacing: Option<StepPacing<'a>>,
}

impl<'a> PaginationController<'a> {
    pub fn new(humanizer: &'a Humanizer, cancel: &'a CancellationToken) -> Self {
        Self {
            humanizer,
            cancel,
            pacing: None,
        }
    }

    /// Space content-loading steps through `pacer` under `domain`.
    pub fn paced(
        mut self,
        pacer: &'a DomainPacer,
        domain: &'a str,
        range: &'a RateLimitRange,
    ) -> Self {
        self.pacing = Some(StepPacing {
            pacer,
            domain,
            range,
        });
        self
    }

    /// Feed the seed content, then paginate.
    pub async fn run(
        &self,
        profile: &SiteProfile,
        page: &mut dyn PageHandle,
        initial: &str,
        on_content: &mut OnContent<'_>,
    ) -> PaginationReport {
        let seed_url = page.url().to_string();
        let seed_count = on_content(&seed_url, initial);
        debug!(
            "{}: seed page yielded {} candidates, pagination={}",
            profile.domain,
            seed_count,
            profile.pagination.name()
        );

        let report = match &profile.pagination {
            PaginationStrategy::None => PaginationReport::stopped(0, StopReason::SinglePage),
            PaginationStrategy::Numbered {
                url_template,
                max_pages,
            } => {
                if seed_count == 0 {
                    PaginationReport::stopped(0, StopReason::EmptyPage)
                } else {
                    self.numbered(
                        page,
                        &seed_url,
                        url_template,
                        *max_pages,
                        profile.selectors.next_page_control.as_deref(),
                        on_content,
                    )
                    .await
                }
            }
            PaginationStrategy::InfiniteScroll {
                max_scrolls,
                scroll_pause_ms,
            } => {
                self.infinite_scroll(
                    page,
                    *max_scrolls,
                    Duration::from_millis(*scroll_pause_ms),
                    on_content,
                )
                .await
            }
            PaginationStrategy::LoadMore {
                max_clicks,
                settle_ms,
            } => match profile.selectors.load_more_control.as_deref() {
                Some(control) => {
                    self.load_more(
                        page,
                        control,
                        initial,
                        *max_clicks,
                        Duration::from_millis(*settle_ms),
                        on_content,
                    )
                    .await
                }
                None => PaginationReport::failed(
                    0,
                    ScrapeError::Parse("load-more pagination without a control selector".into()),
                ),
            },
        };

        if let Some(e) = &report.error {
            warn!(
                "{}: pagination stopped after {} steps: {}",
                profile.domain, report.steps, e
            );
        } else {
            debug!(
                "{}: pagination finished after {} steps ({:?})",
                profile.domain, report.steps, report.stop
            );
        }
        report
    }

    /// Simulated activity between steps. Only cancellation is fatal.
    async fn between_steps(&self, page: &mut dyn PageHandle) -> Result<(), ScrapeError> {
        self.humanizer.perform(page, self.cancel).await
    }

    /// Wait for the domain's next request slot.
    async fn before_request(&self) -> Result<(), ScrapeError> {
        if self.cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        if let Some(p) = &self.pacing {
            p.pacer.acquire(p.domain, p.range, self.cancel).await?;
        }
        Ok(())
    }

    async fn after_request(&self) {
        if let Some(p) = &self.pacing {
            p.pacer.complete(p.domain).await;
        }
    }

    async fn numbered(
        &self,
        page: &mut dyn PageHandle,
        seed_url: &str,
        template: &str,
        max_pages: u32,
        next_control: Option<&str>,
        on_content: &mut OnContent<'_>,
    ) -> PaginationReport {
        let mut steps = 0;
        for page_no in 2..=max_pages {
            if let Some(control) = next_control {
                if let Ok(false) = page.is_visible(control).await {
                    return PaginationReport::stopped(steps, StopReason::ControlGone);
                }
            }
            if let Err(e) = self.between_steps(page).await {
                return PaginationReport::failed(steps, e);
            }
            let raw = template.replace("{page}", &page_no.to_string());
            let Some(url) = resolve_url(seed_url, &raw) else {
                return PaginationReport::failed(
                    steps,
                    ScrapeError::Parse(format!("cannot build page URL from {}", raw)),
                );
            };
            if let Err(e) = self.before_request().await {
                return PaginationReport::failed(steps, e);
            }
            let navigated = page.navigate(&url).await;
            self.after_request().await;
            let content = match navigated {
                Ok(content) => content,
                Err(e) => return PaginationReport::failed(steps, e),
            };
            steps += 1;
            if on_content(&url, &content) == 0 {
                return PaginationReport::stopped(steps, StopReason::EmptyPage);
            }
        }
        PaginationReport::stopped(steps, StopReason::LimitReached)
    }

    async fn infinite_scroll(
        &self,
        page: &mut dyn PageHandle,
        max_scrolls: u32,
        scroll_pause: Duration,
        on_content: &mut OnContent<'_>,
    ) -> PaginationReport {
        let mut last_height = match page.scroll_height().await {
            Ok(h) => h,
            Err(e) => return PaginationReport::failed(0, e),
        };

        for iteration in 1..=max_scrolls {
            if iteration > 1 {
                if let Err(e) = self.between_steps(page).await {
                    return PaginationReport::failed(iteration - 1, e);
                }
            }
            if let Err(e) = self.before_request().await {
                return PaginationReport::failed(iteration - 1, e);
            }
            if let Err(e) = page.scroll_to_bottom().await {
                return PaginationReport::failed(iteration - 1, e);
            }
            let settled = pause(scroll_pause, self.cancel).await;
            self.after_request().await;
            if let Err(e) = settled {
                return PaginationReport::failed(iteration, e);
            }
            let height = match page.scroll_height().await {
                Ok(h) => h,
                Err(e) => return PaginationReport::failed(iteration, e),
            };
            if height == last_height {
                return PaginationReport::stopped(iteration, StopReason::HeightStable);
            }
            last_height = height;

            match page.content().await {
                Ok(content) => {
                    let url = page.url().to_string();
                    on_content(&url, &content);
                }
                Err(e) => return PaginationReport::failed(iteration, e),
            }
        }
        PaginationReport::stopped(max_scrolls, StopReason::LimitReached)
    }

    async fn load_more(
        &self,
        page: &mut dyn PageHandle,
        control: &str,
        initial: &str,
        max_clicks: u32,
        settle: Duration,
        on_content: &mut OnContent<'_>,
    ) -> PaginationReport {
        let mut previous = initial.to_string();
        let mut clicks = 0;

        while clicks < max_clicks {
            if clicks > 0 {
                if let Err(e) = self.between_steps(page).await {
                    return PaginationReport::failed(clicks, e);
                }
            }
            match page.control_state(control).await {
                Ok(ControlState::Ready) => {}
                Ok(state) => {
                    debug!("Load-more control {} is {:?}", control, state);
                    return PaginationReport::stopped(clicks, StopReason::ControlGone);
                }
                Err(e) => return PaginationReport::failed(clicks, e),
            }
            if let Err(e) = self.before_request().await {
                return PaginationReport::failed(clicks, e);
            }
            if let Err(e) = page.click(control).await {
                self.after_request().await;
                debug!("Load-more click failed: {}", e);
                return PaginationReport::stopped(clicks, StopReason::ClickFailed);
            }
            clicks += 1;
            let settled = pause(settle, self.cancel).await;
            self.after_request().await;
            if let Err(e) = settled {
                return PaginationReport::failed(clicks, e);
            }
            let content = match page.content().await {
                Ok(content) => content,
                Err(e) => return PaginationReport::failed(clicks, e),
            };
            if content == previous {
                return PaginationReport::stopped(clicks, StopReason::ContentUnchanged);
            }
            let url = page.url().to_string();
            on_content(&url, &content);
            previous = content;
        }
        PaginationReport::stopped(clicks, StopReason::LimitReached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SelectorSet, SiteProfile};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Scripted page: numbered URLs map to content, scroll heights and
    /// control states are consumed in order.
    #[derive(Default)]
    struct ScriptedPage {
        url: String,
        content: String,
        pages: HashMap<String, String>,
        heights: Vec<u64>,
        height_reads: usize,
        scrolls: u32,
        controls: Vec<ControlState>,
        clicks: u32,
        after_click: Vec<String>,
        navigations: Vec<String>,
    }

    #[async_trait]
    impl PageHandle for ScriptedPage {
        fn url(&self) -> &str {
            &self.url
        }
        fn supports_interaction(&self) -> bool {
            true
        }
        async fn content(&mut self) -> Result<String, ScrapeError> {
            Ok(self.content.clone())
        }
        async fn navigate(&mut self, url: &str) -> Result<String, ScrapeError> {
            self.navigations.push(url.to_string());
            self.url = url.to_string();
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ScrapeError::Http {
                    status: 404,
                    url: url.to_string(),
                })
        }
        async fn title(&mut self) -> Result<String, ScrapeError> {
            Ok(String::new())
        }
        async fn is_visible(&mut self, _selector: &str) -> Result<bool, ScrapeError> {
            Ok(false)
        }
        async fn attribute(
            &mut self,
            _selector: &str,
            _name: &str,
        ) -> Result<Option<String>, ScrapeError> {
            Ok(None)
        }
        async fn scroll_height(&mut self) -> Result<u64, ScrapeError> {
            let idx = self.height_reads.min(self.heights.len() - 1);
            self.height_reads += 1;
            Ok(self.heights[idx])
        }
        async fn scroll_to_bottom(&mut self) -> Result<(), ScrapeError> {
            self.scrolls += 1;
            self.content.push_str("<li>more</li>");
            Ok(())
        }
        async fn control_state(&mut self, _selector: &str) -> Result<ControlState, ScrapeError> {
            Ok(self
                .controls
                .get(self.clicks as usize)
                .copied()
                .unwrap_or(ControlState::Missing))
        }
        async fn click(&mut self, _selector: &str) -> Result<(), ScrapeError> {
            if let Some(next) = self.after_click.get(self.clicks as usize) {
                self.content = next.clone();
            }
            self.clicks += 1;
            Ok(())
        }
    }

    fn profile(pagination: PaginationStrategy) -> SiteProfile {
        SiteProfile {
            domain: "shop.example.ir".to_string(),
            seed_urls: vec!["https://shop.example.ir/c/mobile".to_string()],
            selectors: SelectorSet {
                list: Some("li".to_string()),
                title: Some("h3".to_string()),
                price: Some(".price".to_string()),
                load_more_control: Some("button.more".to_string()),
                ..Default::default()
            },
            pagination,
            ..Default::default()
        }
    }

    fn count_items(content: &str) -> usize {
        content.matches("<li").count()
    }

    async fn run(profile: &SiteProfile, page: &mut ScriptedPage, initial: &str) -> (PaginationReport, Vec<String>) {
        let humanizer = Humanizer::disabled();
        let cancel = CancellationToken::new();
        let mut seen = Vec::new();
        let mut on_content = |url: &str, content: &str| {
            seen.push(url.to_string());
            count_items(content)
        };
        let report = PaginationController::new(&humanizer, &cancel)
            .run(profile, page, initial, &mut on_content)
            .await;
        (report, seen)
    }

    #[tokio::test]
    async fn numbered_stops_after_first_empty_page() {
        let profile = profile(PaginationStrategy::Numbered {
            url_template: "?page={page}".to_string(),
            max_pages: 3,
        });
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            ..Default::default()
        };
        page.pages.insert(
            "https://shop.example.ir/c/mobile?page=2".to_string(),
            "<ul><li>a</li></ul>".to_string(),
        );
        page.pages.insert(
            "https://shop.example.ir/c/mobile?page=3".to_string(),
            "<ul></ul>".to_string(),
        );

        let (report, seen) = run(&profile, &mut page, "<ul><li>x</li></ul>").await;
        assert_eq!(report.stop, StopReason::EmptyPage);
        assert_eq!(report.steps, 2);
        assert_eq!(seen.len(), 3);
        assert_eq!(page.navigations.len(), 2);
        assert!(!report.is_partial());
    }

    #[tokio::test]
    async fn numbered_never_exceeds_max_pages() {
        let profile = profile(PaginationStrategy::Numbered {
            url_template: "https://shop.example.ir/c/mobile/page/{page}".to_string(),
            max_pages: 4,
        });
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            ..Default::default()
        };
        for n in 2..=9 {
            page.pages.insert(
                format!("https://shop.example.ir/c/mobile/page/{}", n),
                "<li>x</li>".to_string(),
            );
        }
        let (report, _) = run(&profile, &mut page, "<li>x</li>").await;
        assert_eq!(report.stop, StopReason::LimitReached);
        assert_eq!(page.navigations.len(), 3);
    }

    #[tokio::test]
    async fn numbered_stops_when_next_control_is_missing() {
        let mut profile = profile(PaginationStrategy::Numbered {
            url_template: "?page={page}".to_string(),
            max_pages: 5,
        });
        profile.selectors.next_page_control = Some("a.next".to_string());
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            ..Default::default()
        };

        let (report, seen) = run(&profile, &mut page, "<li>x</li>").await;
        assert_eq!(report.stop, StopReason::ControlGone);
        assert_eq!(report.steps, 0);
        assert_eq!(seen.len(), 1);
        assert!(page.navigations.is_empty());
    }

    #[tokio::test]
    async fn numbered_failure_keeps_earlier_pages() {
        let profile = profile(PaginationStrategy::Numbered {
            url_template: "?p={page}".to_string(),
            max_pages: 5,
        });
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            ..Default::default()
        };
        page.pages.insert(
            "https://shop.example.ir/c/mobile?p=2".to_string(),
            "<li>x</li>".to_string(),
        );
        let (report, seen) = run(&profile, &mut page, "<li>x</li>").await;
        assert!(report.is_partial());
        assert_eq!(report.stop, StopReason::Failed);
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn infinite_scroll_stops_when_height_stable() {
        let profile = profile(PaginationStrategy::InfiniteScroll {
            max_scrolls: 10,
            scroll_pause_ms: 1,
        });
        // Initial read, then one read per scroll; the fourth scroll sees no growth.
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            heights: vec![1000, 2000, 3000, 4000, 4000],
            ..Default::default()
        };
        let (report, seen) = run(&profile, &mut page, "<li>x</li>").await;
        assert_eq!(report.stop, StopReason::HeightStable);
        assert_eq!(report.steps, 4);
        assert_eq!(page.scrolls, 4);
        assert_eq!(seen.len(), 4);
    }

    #[tokio::test]
    async fn infinite_scroll_bounded_by_max_scrolls() {
        let profile = profile(PaginationStrategy::InfiniteScroll {
            max_scrolls: 3,
            scroll_pause_ms: 1,
        });
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            heights: (1..=20).map(|n| n * 500).collect(),
            ..Default::default()
        };
        let (report, _) = run(&profile, &mut page, "").await;
        assert_eq!(report.stop, StopReason::LimitReached);
        assert_eq!(page.scrolls, 3);
    }

    #[tokio::test]
    async fn load_more_stops_when_control_disables() {
        let profile = profile(PaginationStrategy::LoadMore {
            max_clicks: 10,
            settle_ms: 1,
        });
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            controls: vec![ControlState::Ready, ControlState::Ready, ControlState::Disabled],
            after_click: vec!["<li>1</li><li>2</li>".into(), "<li>1</li><li>2</li><li>3</li>".into()],
            ..Default::default()
        };
        let (report, seen) = run(&profile, &mut page, "<li>1</li>").await;
        assert_eq!(report.stop, StopReason::ControlGone);
        assert_eq!(report.steps, 2);
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn load_more_stops_on_unchanged_content() {
        let profile = profile(PaginationStrategy::LoadMore {
            max_clicks: 10,
            settle_ms: 1,
        });
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            content: "<li>1</li>".to_string(),
            controls: vec![ControlState::Ready; 10],
            ..Default::default()
        };
        let (report, _) = run(&profile, &mut page, "<li>1</li>").await;
        assert_eq!(report.stop, StopReason::ContentUnchanged);
        assert_eq!(page.clicks, 1);
    }

    #[tokio::test]
    async fn load_more_bounded_by_max_clicks() {
        let profile = profile(PaginationStrategy::LoadMore {
            max_clicks: 2,
            settle_ms: 1,
        });
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            controls: vec![ControlState::Ready; 10],
            after_click: (1..=10).map(|n| "<li></li>".repeat(n)).collect(),
            ..Default::default()
        };
        let (report, _) = run(&profile, &mut page, "").await;
        assert_eq!(report.stop, StopReason::LimitReached);
        assert_eq!(page.clicks, 2);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_next_page() {
        let profile = profile(PaginationStrategy::Numbered {
            url_template: "?page={page}".to_string(),
            max_pages: 3,
        });
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            ..Default::default()
        };
        page.pages.insert(
            "https://shop.example.ir/c/mobile?page=2".to_string(),
            "<li>x</li>".to_string(),
        );
        let humanizer = Humanizer::disabled();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut on_content = |_: &str, content: &str| count_items(content);
        let report = PaginationController::new(&humanizer, &cancel)
            .run(&profile, &mut page, "<li>x</li>", &mut on_content)
            .await;
        assert!(matches!(report.error, Some(ScrapeError::Cancelled)));
        assert!(page.navigations.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn load_more_clicks_share_the_domain_pacer() {
        let profile = profile(PaginationStrategy::LoadMore {
            max_clicks: 3,
            settle_ms: 1,
        });
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            controls: vec![ControlState::Ready; 10],
            after_click: (1..=10).map(|n| "<li></li>".repeat(n)).collect(),
            ..Default::default()
        };
        let pacer = DomainPacer::new();
        let range = RateLimitRange {
            min_ms: 1500,
            max_ms: 1500,
        };
        let humanizer = Humanizer::disabled();
        let cancel = CancellationToken::new();
        // The seed fetch already used the domain's first slot.
        pacer.acquire("shop.example.ir", &range, &cancel).await.unwrap();

        let started = tokio::time::Instant::now();
        let mut on_content = |_: &str, content: &str| count_items(content);
        let report = PaginationController::new(&humanizer, &cancel)
            .paced(&pacer, "shop.example.ir", &range)
            .run(&profile, &mut page, "", &mut on_content)
            .await;
        assert_eq!(report.stop, StopReason::LimitReached);
        assert_eq!(page.clicks, 3);
        assert!(started.elapsed() >= Duration::from_millis(4500));
    }

    #[tokio::test]
    async fn single_page_strategy_only_reads_seed() {
        let profile = profile(PaginationStrategy::None);
        let mut page = ScriptedPage {
            url: "https://shop.example.ir/c/mobile".to_string(),
            ..Default::default()
        };
        let (report, seen) = run(&profile, &mut page, "<li>x</li>").await;
        assert_eq!(report.stop, StopReason::SinglePage);
        assert_eq!(seen, vec!["https://shop.example.ir/c/mobile".to_string()]);
    }
}
