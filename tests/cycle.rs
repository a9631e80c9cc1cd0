//! Crawl cycle tests against in-process fake drivers.
//!
//! The fakes stand in for HTTP and browser drivers so retry, escalation,
//! circuit breaking and challenge handling run through the real orchestrator
//! without network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use shopscrape::config::{
    ComplexityTier, EngineConfig, FetchStrategy, PaginationStrategy, ProfileSet, RateLimitRange,
    SelectorSet, SiteProfile,
};
use shopscrape::error::ScrapeError;
use shopscrape::fetch::{FetchDriver, FetchedPage, PageHandle, SessionLease};
use shopscrape::models::{FailureKind, FetchOutcome, TaskBatch};
use shopscrape::scheduler::{
    ChannelSink, CircuitStatus, Drivers, InMemoryMetrics, Orchestrator,
};

const LISTING: &str = r#"<html><head><title>گوشی موبایل</title></head><body><ul>
  <li class="item"><h3>گوشی سامسونگ A54</h3><span class="price">۲۵۰,۰۰۰ تومان</span><a href="/p/a54">مشاهده</a></li>
  <li class="item"><h3>گوشی شیائومی Note 12</h3><span class="price">۱۸۹,۰۰۰ تومان</span><a href="/p/note12">مشاهده</a></li>
  <li class="item"><h3></h3><span class="price">۱۰۰ تومان</span></li>
</ul></body></html>"#;

const PAGE_TWO: &str = r#"<html><body><ul>
  <li class="item"><h3>گوشی شیائومی Note 12</h3><span class="price">۱۸۹,۰۰۰ تومان</span><a href="/p/note12">مشاهده</a></li>
  <li class="item"><h3>گوشی اپل iPhone 13</h3><span class="price">۵۹۰,۰۰۰ تومان</span><a href="/p/iphone13">مشاهده</a></li>
</ul></body></html>"#;

type Respond = Box<dyn Fn(usize) -> Result<String, ScrapeError> + Send + Sync>;

/// Start times of every fetch and page navigation.
type RequestLog = Arc<Mutex<Vec<Instant>>>;

struct FakeDriver {
    strategy: FetchStrategy,
    calls: AtomicUsize,
    respond: Respond,
    title: String,
    pages: HashMap<String, String>,
    delay: Option<Duration>,
    navigate_delay: Option<Duration>,
    requests: RequestLog,
}

impl FakeDriver {
    fn new(strategy: FetchStrategy, respond: Respond) -> Self {
        Self {
            strategy,
            calls: AtomicUsize::new(0),
            respond,
            title: String::new(),
            pages: HashMap::new(),
            delay: None,
            navigate_delay: None,
            requests: RequestLog::default(),
        }
    }

    fn serving(strategy: FetchStrategy, content: &'static str) -> Self {
        Self::new(strategy, Box::new(move |_| Ok(content.to_string())))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn request_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchDriver for FakeDriver {
    fn strategy(&self) -> FetchStrategy {
        self.strategy
    }

    async fn fetch(
        &self,
        url: &str,
        _profile: &SiteProfile,
        session: Option<&SessionLease>,
    ) -> Result<FetchedPage, ScrapeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(Instant::now());
        if self.strategy.is_browser() {
            assert!(session.is_some(), "browser drivers always get a session");
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let content = (self.respond)(n)?;
        Ok(FetchedPage {
            content: content.clone(),
            final_url: url.to_string(),
            status: Some(200),
            page: Box::new(FakePage {
                url: url.to_string(),
                content,
                title: self.title.clone(),
                pages: self.pages.clone(),
                navigate_delay: self.navigate_delay,
                requests: self.requests.clone(),
            }),
        })
    }
}

struct FakePage {
    url: String,
    content: String,
    title: String,
    pages: HashMap<String, String>,
    navigate_delay: Option<Duration>,
    requests: RequestLog,
}

#[async_trait]
impl PageHandle for FakePage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn content(&mut self) -> Result<String, ScrapeError> {
        Ok(self.content.clone())
    }

    async fn navigate(&mut self, url: &str) -> Result<String, ScrapeError> {
        self.requests.lock().unwrap().push(Instant::now());
        if let Some(delay) = self.navigate_delay {
            tokio::time::sleep(delay).await;
        }
        let content = self.pages.get(url).cloned().ok_or_else(|| ScrapeError::Http {
            status: 404,
            url: url.to_string(),
        })?;
        self.url = url.to_string();
        self.content = content.clone();
        Ok(content)
    }

    async fn title(&mut self) -> Result<String, ScrapeError> {
        Ok(self.title.clone())
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
}

fn profile(domain: &str, seeds: usize) -> SiteProfile {
    SiteProfile {
        domain: domain.to_string(),
        seed_urls: (1..=seeds)
            .map(|n| format!("https://{}/category/{}", domain, n))
            .collect(),
        selectors: SelectorSet {
            list: Some("li.item".to_string()),
            title: Some("h3".to_string()),
            price: Some(".price".to_string()),
            link: Some("a".to_string()),
            ..Default::default()
        },
        rate_limit: RateLimitRange {
            min_ms: 0,
            max_ms: 0,
        },
        ..Default::default()
    }
}

fn config(max_retries: u32, escalate: bool) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.max_retries = max_retries;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config.retry.jitter_ms = 0;
    config.retry.escalate = escalate;
    config.stealth.humanize = false;
    config
}

struct Harness {
    orchestrator: Orchestrator,
    rx: mpsc::Receiver<TaskBatch>,
    metrics: Arc<InMemoryMetrics>,
}

impl Harness {
    fn new(
        config: EngineConfig,
        profiles: Vec<SiteProfile>,
        http: Arc<FakeDriver>,
        browser: Arc<FakeDriver>,
    ) -> Self {
        let stealth = Arc::new(FakeDriver::serving(FetchStrategy::Stealth, LISTING));
        let (sink, rx) = ChannelSink::channel(256);
        let metrics = Arc::new(InMemoryMetrics::new());
        let orchestrator = Orchestrator::builder(
            config,
            ProfileSet::new(profiles).unwrap(),
            Arc::new(sink),
        )
        .drivers(Drivers {
            http,
            browser,
            stealth,
        })
        .metrics(metrics.clone())
        .build()
        .unwrap();
        Self {
            orchestrator,
            rx,
            metrics,
        }
    }

    fn batches(&mut self) -> Vec<TaskBatch> {
        let mut batches = Vec::new();
        while let Ok(batch) = self.rx.try_recv() {
            batches.push(batch);
        }
        batches
    }
}

#[tokio::test]
async fn extracts_products_from_listing() {
    let http = Arc::new(FakeDriver::serving(FetchStrategy::Http, LISTING));
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut h = Harness::new(config(3, true), vec![profile("shop.example.ir", 1)], http.clone(), browser);

    let summary = h.orchestrator.run_cycle().await;
    let batches = h.batches();

    assert_eq!(http.calls(), 1);
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.outcome, FetchOutcome::Success);
    assert_eq!(batch.products.len(), 2);
    let a54 = &batch.products[0];
    assert_eq!(a54.title, "گوشی سامسونگ A54");
    assert_eq!(a54.price.toman, 250_000);
    assert_eq!(a54.price_minor, 2_500_000);
    assert_eq!(a54.product_url, "https://shop.example.ir/p/a54");
    assert_eq!(a54.vendor, "shop.example.ir");

    let report = summary.vendor("shop.example.ir").unwrap();
    assert_eq!(report.tasks, 1);
    assert_eq!(report.successes, 1);
    assert_eq!(report.products, 2);
    assert!(summary.errors.is_empty());
    assert!(!summary.is_aborted());
    assert_eq!(h.metrics.flushed()[0].attempts, 1);
}

#[tokio::test]
async fn blocked_vendor_trips_circuit_and_skips_without_fetching() {
    let http = Arc::new(FakeDriver::new(
        FetchStrategy::Http,
        Box::new(|_| {
            Err(ScrapeError::Blocked {
                domain: "shop.example.ir".to_string(),
                reason: "429 Too Many Requests".to_string(),
            })
        }),
    ));
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut config = config(0, false);
    config.circuit.failure_threshold = 3;
    let mut h = Harness::new(config, vec![profile("shop.example.ir", 4)], http.clone(), browser.clone());

    let summary = h.orchestrator.run_cycle().await;
    let batches = h.batches();

    assert_eq!(http.calls(), 3, "fourth task must not reach the driver");
    assert_eq!(browser.calls(), 0);
    assert_eq!(batches.len(), 4);
    assert_eq!(batches[3].outcome, FetchOutcome::CircuitOpen);
    assert_eq!(batches[3].attempts.len(), 1);
    assert_eq!(batches[3].attempts[0].outcome, FetchOutcome::CircuitOpen);

    let report = summary.vendor("shop.example.ir").unwrap();
    assert_eq!(report.failures[&FailureKind::Blocked], 3);
    assert_eq!(report.skipped_by_circuit, 1);
    assert_eq!(summary.skipped_by_circuit, vec!["shop.example.ir".to_string()]);
    assert_eq!(summary.errors.len(), 3);
    assert_eq!(
        h.orchestrator.circuit_status("shop.example.ir").await,
        CircuitStatus::Open
    );
}

#[tokio::test]
async fn network_errors_are_retried_with_backoff() {
    let http = Arc::new(FakeDriver::new(
        FetchStrategy::Http,
        Box::new(|n| {
            if n < 2 {
                Err(ScrapeError::Network("connection reset".to_string()))
            } else {
                Ok(LISTING.to_string())
            }
        }),
    ));
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut h = Harness::new(config(3, true), vec![profile("shop.example.ir", 1)], http.clone(), browser);

    h.orchestrator.run_cycle().await;
    let batches = h.batches();

    assert_eq!(http.calls(), 3);
    let attempts = &batches[0].attempts;
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[0].outcome, FetchOutcome::NetworkError);
    assert_eq!(attempts[1].retry_count, 1);
    assert_eq!(attempts[2].outcome, FetchOutcome::Success);
    assert_eq!(batches[0].outcome, FetchOutcome::Success);
    assert_eq!(batches[0].products.len(), 2);
}

#[tokio::test]
async fn simple_tier_escalates_to_browser_once() {
    let http = Arc::new(FakeDriver::new(
        FetchStrategy::Http,
        Box::new(|_| {
            Err(ScrapeError::Http {
                status: 500,
                url: "https://shop.example.ir/category/1".to_string(),
            })
        }),
    ));
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut h = Harness::new(config(1, true), vec![profile("shop.example.ir", 1)], http.clone(), browser.clone());

    h.orchestrator.run_cycle().await;
    let batches = h.batches();

    assert_eq!(http.calls(), 2);
    assert_eq!(browser.calls(), 1);
    let attempts = &batches[0].attempts;
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[2].strategy_used, FetchStrategy::Browser);
    assert_eq!(batches[0].outcome, FetchOutcome::Success);
}

#[tokio::test]
async fn escalation_can_be_disabled() {
    let http = Arc::new(FakeDriver::new(
        FetchStrategy::Http,
        Box::new(|_| Err(ScrapeError::Network("unreachable".to_string()))),
    ));
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut h = Harness::new(config(0, false), vec![profile("shop.example.ir", 1)], http.clone(), browser.clone());

    let summary = h.orchestrator.run_cycle().await;
    assert_eq!(http.calls(), 1);
    assert_eq!(browser.calls(), 0);
    assert_eq!(h.batches()[0].outcome, FetchOutcome::NetworkError);
    assert_eq!(summary.errors[0].kind, FailureKind::NetworkError);
}

#[tokio::test]
async fn unresolved_challenge_is_terminal() {
    let http = Arc::new(FakeDriver::serving(FetchStrategy::Http, LISTING));
    let mut browser = FakeDriver::serving(FetchStrategy::Browser, LISTING);
    browser.title = "Just a moment...".to_string();
    let browser = Arc::new(browser);
    let mut vendor = profile("shop.example.ir", 1);
    vendor.complexity_tier = ComplexityTier::Moderate;
    let mut h = Harness::new(config(3, true), vec![vendor], http.clone(), browser.clone());

    let summary = h.orchestrator.run_cycle().await;
    let batches = h.batches();

    assert_eq!(browser.calls(), 1, "challenges are never retried");
    assert_eq!(http.calls(), 0);
    assert_eq!(batches[0].outcome, FetchOutcome::ChallengeUnresolved);
    assert!(batches[0].products.is_empty());
    let challenge = batches[0].challenge.as_ref().unwrap();
    assert_eq!(challenge.signature, "cloudflare");
    assert!(!challenge.resolved);
    assert_eq!(summary.vendor("shop.example.ir").unwrap().challenges, 1);
}

#[tokio::test]
async fn empty_content_is_a_parse_error_without_retry() {
    let http = Arc::new(FakeDriver::serving(FetchStrategy::Http, "   "));
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut h = Harness::new(config(3, true), vec![profile("shop.example.ir", 1)], http.clone(), browser.clone());

    h.orchestrator.run_cycle().await;
    let batches = h.batches();

    assert_eq!(http.calls(), 1);
    assert_eq!(browser.calls(), 0);
    assert_eq!(batches[0].outcome, FetchOutcome::ParseError);
}

#[tokio::test]
async fn numbered_pages_are_merged_and_deduplicated() {
    let mut http = FakeDriver::serving(FetchStrategy::Http, LISTING);
    http.pages.insert(
        "https://shop.example.ir/category/1?page=2".to_string(),
        PAGE_TWO.to_string(),
    );
    http.pages.insert(
        "https://shop.example.ir/category/1?page=3".to_string(),
        "<html><body><ul></ul></body></html>".to_string(),
    );
    let http = Arc::new(http);
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut vendor = profile("shop.example.ir", 1);
    vendor.pagination = PaginationStrategy::Numbered {
        url_template: "?page={page}".to_string(),
        max_pages: 5,
    };
    let mut h = Harness::new(config(0, false), vec![vendor], http, browser);

    h.orchestrator.run_cycle().await;
    let batches = h.batches();

    let titles: Vec<&str> = batches[0].products.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["گوشی سامسونگ A54", "گوشی شیائومی Note 12", "گوشی اپل iPhone 13"]
    );
    assert!(!batches[0].partial);
    assert_eq!(batches[0].outcome, FetchOutcome::Success);
}

#[tokio::test]
async fn pagination_failure_keeps_earlier_records() {
    let http = Arc::new(FakeDriver::serving(FetchStrategy::Http, LISTING));
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut vendor = profile("shop.example.ir", 1);
    vendor.pagination = PaginationStrategy::Numbered {
        url_template: "?page={page}".to_string(),
        max_pages: 3,
    };
    let mut h = Harness::new(config(3, true), vec![vendor], http.clone(), browser);

    let summary = h.orchestrator.run_cycle().await;
    let batches = h.batches();

    assert_eq!(http.calls(), 1, "partial results are not retried");
    assert!(batches[0].partial);
    assert_eq!(batches[0].outcome, FetchOutcome::HttpError);
    assert_eq!(batches[0].products.len(), 2);
    assert_eq!(summary.vendor("shop.example.ir").unwrap().partial, 1);
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_retried_once() {
    let mut http = FakeDriver::serving(FetchStrategy::Http, LISTING);
    http.delay = Some(Duration::from_secs(3600));
    let http = Arc::new(http);
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut config = config(3, false);
    config.timeouts.task_timeout_secs = 2;
    let mut h = Harness::new(config, vec![profile("shop.example.ir", 1)], http.clone(), browser);

    h.orchestrator.run_cycle().await;
    let batches = h.batches();

    assert_eq!(http.calls(), 2);
    assert_eq!(batches[0].outcome, FetchOutcome::Timeout);
    assert_eq!(batches[0].attempts.len(), 2);
}

#[tokio::test]
async fn resource_exhaustion_aborts_the_cycle() {
    let http = Arc::new(FakeDriver::serving(FetchStrategy::Http, LISTING));
    let browser = Arc::new(FakeDriver::new(
        FetchStrategy::Browser,
        Box::new(|_| Err(ScrapeError::ResourceExhausted("no browser".to_string()))),
    ));
    let mut vendor = profile("shop.example.ir", 3);
    vendor.complexity_tier = ComplexityTier::Complex;
    let mut config = config(3, true);
    config.concurrency.max_concurrent_fetches = 1;
    let mut h = Harness::new(config, vec![vendor], http, browser.clone());

    let summary = h.orchestrator.run_cycle().await;

    assert!(summary.is_aborted());
    assert_eq!(browser.calls(), 1);
    assert_eq!(h.batches().len(), 1);
}

#[tokio::test]
async fn vendors_are_reported_in_priority_order() {
    let http = Arc::new(FakeDriver::serving(FetchStrategy::Http, LISTING));
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut low = profile("small.example.ir", 1);
    low.priority = 0.1;
    let mut high = profile("big.example.ir", 1);
    high.priority = 0.9;
    let mut h = Harness::new(config(0, false), vec![low, high], http, browser);

    let summary = h.orchestrator.run_cycle().await;
    let vendors: Vec<&str> = summary.vendors.iter().map(|v| v.vendor.as_str()).collect();
    assert_eq!(vendors, vec!["big.example.ir", "small.example.ir"]);
    assert_eq!(summary.total_products(), 4);
    assert_eq!(h.batches().len(), 2);
}

#[tokio::test]
async fn reload_replaces_profiles_and_keeps_them_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vendors.yaml");
    std::fs::write(
        &path,
        r#"
profiles:
  - domain: small.example.ir
    seed_urls: ["https://small.example.ir/mobile"]
    priority: 0.2
    selectors: { list: "li.item", title: "h3", price: ".price" }
  - domain: big.example.ir
    seed_urls: ["https://big.example.ir/mobile"]
    priority: 0.8
    selectors: { list: "div.card", title: ".name", price: ".amount" }
"#,
    )
    .unwrap();

    let mut config = config(0, false);
    config.profiles_path = Some(path.clone());
    let http = Arc::new(FakeDriver::serving(FetchStrategy::Http, LISTING));
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let h = Harness::new(config, vec![profile("shop.example.ir", 1)], http, browser);

    assert_eq!(h.orchestrator.reload_profiles().await.unwrap(), 2);
    let profiles = h.orchestrator.profiles().await;
    let domains: Vec<&str> = profiles.iter().map(|p| p.domain.as_str()).collect();
    assert_eq!(domains, vec!["big.example.ir", "small.example.ir"]);

    std::fs::write(&path, "profiles: [{ domain: broken.example.ir }]").unwrap();
    assert!(h.orchestrator.reload_profiles().await.is_err());
    assert_eq!(h.orchestrator.profiles().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn numbered_pages_are_paced_like_seed_fetches() {
    let mut http = FakeDriver::serving(FetchStrategy::Http, LISTING);
    http.pages.insert(
        "https://shop.example.ir/category/1?page=2".to_string(),
        PAGE_TWO.to_string(),
    );
    http.pages.insert(
        "https://shop.example.ir/category/1?page=3".to_string(),
        LISTING.to_string(),
    );
    let http = Arc::new(http);
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut vendor = profile("shop.example.ir", 1);
    vendor.rate_limit = RateLimitRange {
        min_ms: 2000,
        max_ms: 2000,
    };
    vendor.pagination = PaginationStrategy::Numbered {
        url_template: "?page={page}".to_string(),
        max_pages: 3,
    };
    let mut h = Harness::new(config(0, false), vec![vendor], http.clone(), browser);

    h.orchestrator.run_cycle().await;

    let times = http.request_times();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_millis(2000),
            "gap {:?}",
            pair[1] - pair[0]
        );
    }
    let batches = h.batches();
    assert_eq!(batches[0].outcome, FetchOutcome::Success);
    assert_eq!(batches[0].products.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn half_open_circuit_admits_a_single_attempt() {
    let forbidden: fn(usize) -> Result<String, ScrapeError> = |_| {
        Err(ScrapeError::Blocked {
            domain: "shop.example.ir".to_string(),
            reason: "403 Forbidden".to_string(),
        })
    };
    let http = Arc::new(FakeDriver::new(FetchStrategy::Http, Box::new(forbidden)));
    let browser = Arc::new(FakeDriver::new(FetchStrategy::Browser, Box::new(forbidden)));
    let mut config = config(3, true);
    config.circuit.failure_threshold = 1;
    config.circuit.cooldown_secs = 1;
    let mut h = Harness::new(config, vec![profile("shop.example.ir", 1)], http.clone(), browser.clone());

    h.orchestrator.run_cycle().await;
    assert_eq!(http.calls(), 4);
    assert_eq!(browser.calls(), 1);
    assert_eq!(
        h.orchestrator.circuit_status("shop.example.ir").await,
        CircuitStatus::Open
    );

    tokio::time::advance(Duration::from_secs(5)).await;
    h.orchestrator.run_cycle().await;

    assert_eq!(http.calls(), 5, "the half-open attempt gets no retries");
    assert_eq!(browser.calls(), 1, "the half-open attempt is not escalated");
    let batches = h.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].attempts.len(), 1);
    assert_eq!(batches[1].outcome, FetchOutcome::Blocked);
    assert_eq!(
        h.orchestrator.circuit_status("shop.example.ir").await,
        CircuitStatus::Open
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_pagination_and_keeps_seed_records() {
    let mut http = FakeDriver::serving(FetchStrategy::Http, LISTING);
    http.navigate_delay = Some(Duration::from_secs(120));
    http.pages.insert(
        "https://shop.example.ir/category/1?page=2".to_string(),
        PAGE_TWO.to_string(),
    );
    let http = Arc::new(http);
    let browser = Arc::new(FakeDriver::serving(FetchStrategy::Browser, LISTING));
    let mut vendor = profile("shop.example.ir", 2);
    vendor.pagination = PaginationStrategy::Numbered {
        url_template: "?page={page}".to_string(),
        max_pages: 3,
    };
    let mut h = Harness::new(config(3, false), vec![vendor], http.clone(), browser);

    let token = h.orchestrator.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });
    let started = Instant::now();
    h.orchestrator.run_cycle().await;

    assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
    assert_eq!(http.calls(), 1, "the second seed never starts");
    let batches = h.batches();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].partial);
    assert_eq!(batches[0].products.len(), 2);
}
