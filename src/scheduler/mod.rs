//! Task scheduler: one crawl cycle over every loaded profile.
//!
//! Profiles run concurrently (highest priority first) up to the global cap;
//! the seed URLs of one profile run sequentially. Each seed URL becomes a
//! [`ScrapeTask`] that goes through pacing, the circuit breaker, the fetch
//! driver, challenge detection, pagination and extraction, with retries and
//! a one-time tier escalation on failure. Errors never escape a task; only
//! resource exhaustion aborts the cycle.

mod circuit;
mod metrics;
mod pacing;
mod retry;
mod sink;
mod summary;

pub use circuit::{Admission, CircuitBreaker, CircuitStatus};
pub use metrics::{InMemoryMetrics, MetricsSink, MetricsSnapshot, TracingMetrics};
pub use pacing::DomainPacer;
pub use retry::{backoff_delay, retry_budget};
pub use sink::{ChannelSink, ResultSink};
pub use summary::{CycleSummary, TaskError, VendorReport};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::challenge::{CaptchaSolver, ChallengeGate, ChallengeVerdict};
use crate::config::{ComplexityTier, EngineConfig, FetchStrategy, ProfileSet, SiteProfile};
use crate::error::{ConfigError, EngineError, ScrapeError};
use crate::extract::{ExtractionContext, ExtractionPipeline};
use crate::fetch::{
    BrowserFetcher, BrowserHost, FetchDriver, FetchedPage, HttpFetcher, PageHandle, SessionPool,
};
use crate::models::{
    ChallengeRecord, ExtractedProduct, FailureKind, FetchAttempt, FetchOutcome, ScrapeTask,
    TaskBatch,
};
use crate::pagination::PaginationController;
use crate::stealth::{
    pause, FingerprintPool, Humanizer, ProxyManager, RequestFilter, StaticProxyPool,
};

/// One driver per fetch strategy.
#[derive(Clone)]
pub struct Drivers {
    pub http: Arc<dyn FetchDriver>,
    pub browser: Arc<dyn FetchDriver>,
    pub stealth: Arc<dyn FetchDriver>,
}

impl Drivers {
    /// Real drivers: reqwest for HTTP, one shared Chrome for both browser tiers.
    pub fn from_config(config: &EngineConfig) -> Result<(Self, Arc<BrowserHost>), EngineError> {
        let http = HttpFetcher::new(
            Duration::from_secs(config.timeouts.request_timeout_secs),
            config.concurrency.max_http_fetches,
        )
        .map_err(|e| EngineError::Setup(e.to_string()))?;

        let host = Arc::new(BrowserHost::new(config.browser.clone()));
        let filter = RequestFilter::new(
            &config.stealth.blocked_domains,
            config.stealth.resource_drop_fraction,
        );
        let browser = BrowserFetcher::new(host.clone(), false, filter.clone(), config.list_wait());
        let stealth = BrowserFetcher::new(host.clone(), true, filter, config.list_wait());

        Ok((
            Self {
                http: Arc::new(http),
                browser: Arc::new(browser),
                stealth: Arc::new(stealth),
            },
            host,
        ))
    }

    pub fn get(&self, strategy: FetchStrategy) -> &Arc<dyn FetchDriver> {
        match strategy {
            FetchStrategy::Http => &self.http,
            FetchStrategy::Browser => &self.browser,
            FetchStrategy::Stealth => &self.stealth,
        }
    }
}

pub struct OrchestratorBuilder {
    config: EngineConfig,
    profiles: ProfileSet,
    sink: Arc<dyn ResultSink>,
    drivers: Option<Drivers>,
    metrics: Option<Arc<dyn MetricsSink>>,
    solver: Option<Arc<dyn CaptchaSolver>>,
    proxies: Option<Arc<dyn ProxyManager>>,
    cancel: Option<CancellationToken>,
    only: Vec<String>,
}

impl OrchestratorBuilder {
    /// Replace the real drivers, e.g. with in-process fakes.
    pub fn drivers(mut self, drivers: Drivers) -> Self {
        self.drivers = Some(drivers);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn solver(mut self, solver: Arc<dyn CaptchaSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Use an external proxy manager instead of `stealth.proxies`.
    pub fn proxy_manager(mut self, proxies: Arc<dyn ProxyManager>) -> Self {
        self.proxies = Some(proxies);
        self
    }

    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Restrict every cycle (and reload) to these domains.
    pub fn only(mut self, domains: Vec<String>) -> Self {
        self.only = domains;
        self
    }

    pub fn build(self) -> Result<Orchestrator, EngineError> {
        let config = self.config;
        config.validate()?;

        let (drivers, browser_host) = match self.drivers {
            Some(drivers) => (drivers, None),
            None => {
                let (drivers, host) = Drivers::from_config(&config)?;
                (drivers, Some(host))
            }
        };

        let proxies = match self.proxies {
            Some(p) => Some(p),
            None if !config.stealth.proxies.is_empty() => {
                let pool = StaticProxyPool::from_urls(
                    &config.stealth.proxies,
                    config.stealth.proxy_failure_threshold,
                    Duration::from_secs(config.stealth.proxy_cooldown_secs),
                )?;
                info!("Using {} configured proxies", pool.len());
                Some(Arc::new(pool) as Arc<dyn ProxyManager>)
            }
            None => None,
        };

        let mut profiles = self.profiles;
        profiles.retain_domains(&self.only);

        Ok(Orchestrator {
            sessions: SessionPool::new(
                config.concurrency.max_browser_sessions,
                FingerprintPool::new(config.stealth.fingerprint_selection),
                proxies,
            ),
            circuit: CircuitBreaker::new(
                config.circuit.failure_threshold,
                Duration::from_secs(config.circuit.cooldown_secs),
            ),
            permits: Semaphore::new(config.concurrency.max_concurrent_fetches),
            humanizer: Humanizer::new(config.stealth.humanize),
            challenges: ChallengeGate::new(self.solver),
            profiles: RwLock::new(Arc::new(profiles)),
            only: self.only,
            drivers,
            browser_host,
            pacer: DomainPacer::new(),
            sink: self.sink,
            metrics: self
                .metrics
                .unwrap_or_else(|| Arc::new(TracingMetrics::new())),
            cancel: self.cancel.unwrap_or_default(),
            config,
        })
    }
}

pub struct Orchestrator {
    config: EngineConfig,
    profiles: RwLock<Arc<ProfileSet>>,
    only: Vec<String>,
    drivers: Drivers,
    browser_host: Option<Arc<BrowserHost>>,
    sessions: SessionPool,
    circuit: CircuitBreaker,
    pacer: DomainPacer,
    permits: Semaphore,
    challenges: ChallengeGate,
    humanizer: Humanizer,
    sink: Arc<dyn ResultSink>,
    metrics: Arc<dyn MetricsSink>,
    cancel: CancellationToken,
}

/// Successful attempt: content was obtained and processed.
struct AttemptOutput {
    status: Option<u16>,
    challenge: Option<ChallengeRecord>,
    /// Pagination stopped on this error after records were kept.
    error: Option<ScrapeError>,
}

/// Attempt that produced nothing usable.
struct AttemptFailure {
    error: ScrapeError,
    status: Option<u16>,
    challenge: Option<ChallengeRecord>,
}

impl From<ScrapeError> for AttemptFailure {
    fn from(error: ScrapeError) -> Self {
        Self {
            error,
            status: None,
            challenge: None,
        }
    }
}

struct TaskResult {
    outcome: FetchOutcome,
    products: Vec<ExtractedProduct>,
    challenge: Option<ChallengeRecord>,
    partial: bool,
    error: Option<ScrapeError>,
}

struct VendorOutcome {
    index: usize,
    report: VendorReport,
    errors: Vec<TaskError>,
    fatal: Option<String>,
}

/// A task's product buffer, fed page by page.
struct Collector<'p> {
    pipeline: &'p ExtractionPipeline,
    vendor: String,
    products: Vec<ExtractedProduct>,
    seen: HashSet<String>,
    pages: u32,
    parse_error: Option<ScrapeError>,
}

impl<'p> Collector<'p> {
    fn new(pipeline: &'p ExtractionPipeline, vendor: &str) -> Self {
        Self {
            pipeline,
            vendor: vendor.to_string(),
            products: Vec::new(),
            seen: HashSet::new(),
            pages: 0,
            parse_error: None,
        }
    }

    /// Extract one page; returns the candidate count that drives pagination.
    fn accept(&mut self, url: &str, html: &str) -> usize {
        self.pages += 1;
        let ctx = ExtractionContext::new(url, &self.vendor);
        match self.pipeline.extract(html, &ctx) {
            Ok(report) => {
                let before = self.products.len();
                for product in report.products {
                    if self.seen.insert(dedupe_key(&product)) {
                        self.products.push(product);
                    }
                }
                debug!(
                    "{}: {} candidates, {} new products, {} discarded on {} ({:?})",
                    self.vendor,
                    report.candidates,
                    self.products.len() - before,
                    report.discarded,
                    url,
                    report.path
                );
                report.candidates
            }
            Err(e) => {
                debug!("{}: extraction failed on {}: {}", self.vendor, url, e);
                if self.parse_error.is_none() {
                    self.parse_error = Some(e);
                }
                0
            }
        }
    }

    /// Outcome of an attempt that obtained content.
    fn classify(&self, pagination_error: Option<&ScrapeError>) -> (FetchOutcome, Option<String>) {
        if let Some(e) = pagination_error {
            return (FetchOutcome::from(e.kind()), Some(e.to_string()));
        }
        match &self.parse_error {
            Some(e) if self.products.is_empty() => {
                (FetchOutcome::ParseError, Some(e.to_string()))
            }
            _ => (FetchOutcome::Success, None),
        }
    }
}

/// Products without their own link share the listing URL; key those by
/// title and price instead.
fn dedupe_key(product: &ExtractedProduct) -> String {
    if product.product_url != product.source_url {
        product.product_url.clone()
    } else {
        format!("{}\u{1f}{}", product.title, product.price_minor)
    }
}

impl Orchestrator {
    pub fn builder(
        config: EngineConfig,
        profiles: ProfileSet,
        sink: Arc<dyn ResultSink>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            profiles,
            sink,
            drivers: None,
            metrics: None,
            solver: None,
            proxies: None,
            cancel: None,
            only: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token that cancels every suspension point of a running cycle.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn profiles(&self) -> Arc<ProfileSet> {
        self.profiles.read().await.clone()
    }

    pub async fn circuit_status(&self, domain: &str) -> CircuitStatus {
        self.circuit.status(domain).await
    }

    /// Re-read the profile file named by the engine config.
    ///
    /// The current set stays in place when loading fails.
    pub async fn reload_profiles(&self) -> Result<usize, ConfigError> {
        let path = self.config.resolved_profiles_path().ok_or_else(|| {
            ConfigError::Invalid("no profiles_path configured to reload from".to_string())
        })?;
        let mut set = ProfileSet::load_from_path(&path)?;
        set.retain_domains(&self.only);
        let count = set.len();
        *self.profiles.write().await = Arc::new(set);
        info!("Reloaded {} profile(s) from {}", count, path.display());
        Ok(count)
    }

    /// Run every profile once and summarize.
    pub async fn run_cycle(&self) -> CycleSummary {
        let started_at = Utc::now();
        let clock = std::time::Instant::now();
        let profiles: Vec<SiteProfile> = self.profiles.read().await.iter().cloned().collect();
        let cycle = self.cancel.child_token();
        info!("Starting crawl cycle over {} profile(s)", profiles.len());

        let mut outcomes: Vec<VendorOutcome> = stream::iter(profiles.into_iter().enumerate())
            .map(|(index, profile)| self.run_vendor(index, profile, &cycle))
            .buffer_unordered(self.config.concurrency.max_concurrent_fetches.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|o| o.index);

        let mut summary = CycleSummary {
            started_at,
            duration_ms: 0,
            vendors: Vec::with_capacity(outcomes.len()),
            errors: Vec::new(),
            skipped_by_circuit: Vec::new(),
            aborted: None,
        };
        for outcome in outcomes {
            if outcome.report.skipped_by_circuit > 0 {
                summary.skipped_by_circuit.push(outcome.report.vendor.clone());
            }
            if summary.aborted.is_none() {
                summary.aborted = outcome.fatal;
            }
            summary.errors.extend(outcome.errors);
            summary.vendors.push(outcome.report);
        }
        summary.duration_ms = clock.elapsed().as_millis() as u64;

        self.metrics.flush(&summary);
        match &summary.aborted {
            Some(reason) => error!("Cycle aborted after {}ms: {}", summary.duration_ms, reason),
            None => info!(
                "Cycle finished in {}ms: {} products, {} failed task(s), {} vendor(s) skipped by circuit",
                summary.duration_ms,
                summary.total_products(),
                summary.errors.len(),
                summary.skipped_by_circuit.len()
            ),
        }
        summary
    }

    /// Stop the browser and refuse further sessions.
    pub async fn shutdown(&self) {
        self.sessions.close();
        if let Some(host) = &self.browser_host {
            host.shutdown().await;
        }
    }

    async fn run_vendor(
        &self,
        index: usize,
        profile: SiteProfile,
        cycle: &CancellationToken,
    ) -> VendorOutcome {
        let mut outcome = VendorOutcome {
            index,
            report: VendorReport::new(&profile.domain),
            errors: Vec::new(),
            fatal: None,
        };

        let pipeline = match ExtractionPipeline::for_profile(&profile) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!("Skipping {}: {}", profile.domain, e);
                for seed_url in &profile.seed_urls {
                    outcome.report.record(FetchOutcome::ParseError, 0, false, false);
                    outcome.errors.push(TaskError {
                        vendor: profile.domain.clone(),
                        seed_url: seed_url.clone(),
                        kind: FailureKind::ParseError,
                        message: e.to_string(),
                    });
                }
                return outcome;
            }
        };

        for (seed_index, seed_url) in profile.seed_urls.iter().enumerate() {
            if cycle.is_cancelled() {
                break;
            }
            let mut task = ScrapeTask::new(&profile.domain, seed_url, seed_index);

            let admission = self.circuit.admit(&profile.domain).await;
            if admission.is_rejected() {
                info!("Circuit open for {}, skipping {}", profile.domain, seed_url);
                task.record(FetchAttempt::circuit_open(profile.effective_strategy()));
                outcome.report.record(FetchOutcome::CircuitOpen, 0, false, false);
                self.sink
                    .deliver(TaskBatch {
                        task_id: task.id,
                        vendor: task.vendor,
                        seed_url: task.seed_url,
                        outcome: FetchOutcome::CircuitOpen,
                        products: Vec::new(),
                        attempts: task.attempts,
                        challenge: None,
                        partial: false,
                    })
                    .await;
                continue;
            }

            let probe = admission == Admission::Probe;
            let result = self
                .run_task(&profile, &pipeline, &mut task, probe, cycle)
                .await;

            if matches!(result.error, Some(ScrapeError::Cancelled)) {
                // Frees a half-open probe slot; a closed circuit ignores it.
                self.circuit
                    .record(&profile.domain, Some(FailureKind::NetworkError))
                    .await;
                debug!("{}: task for {} cancelled", profile.domain, seed_url);
                if !result.products.is_empty() {
                    self.metrics
                        .record_products(&profile.domain, result.products.len());
                    outcome.report.record(
                        result.outcome,
                        result.products.len(),
                        result.challenge.is_some(),
                        true,
                    );
                    self.sink
                        .deliver(TaskBatch {
                            task_id: task.id,
                            vendor: task.vendor,
                            seed_url: task.seed_url,
                            outcome: result.outcome,
                            products: result.products,
                            attempts: task.attempts,
                            challenge: result.challenge,
                            partial: true,
                        })
                        .await;
                }
                break;
            }

            let failure = result.outcome.failure_kind();
            if result.partial {
                // Records were kept; only denials count against the vendor.
                self.circuit
                    .record(&profile.domain, failure.filter(|k| k.trips_circuit()))
                    .await;
            } else {
                self.circuit.record(&profile.domain, failure).await;
            }

            if let Some(e) = result.error.as_ref().filter(|e| e.is_fatal()) {
                error!("{}: {}", profile.domain, e);
                outcome.fatal = Some(e.to_string());
                cycle.cancel();
            }

            self.metrics
                .record_products(&profile.domain, result.products.len());
            if let Some(challenge) = &result.challenge {
                self.metrics
                    .record_challenge(&profile.domain, challenge.challenge_type);
            }
            outcome.report.record(
                result.outcome,
                result.products.len(),
                result.challenge.is_some(),
                result.partial,
            );
            if let (Some(kind), Some(e)) = (failure, &result.error) {
                outcome.errors.push(TaskError {
                    vendor: profile.domain.clone(),
                    seed_url: seed_url.clone(),
                    kind,
                    message: e.to_string(),
                });
            }

            info!(
                "{}: {} -> {} ({} products{})",
                profile.domain,
                seed_url,
                failure.map(|k| k.as_str()).unwrap_or("success"),
                result.products.len(),
                if result.partial { ", partial" } else { "" }
            );

            self.sink
                .deliver(TaskBatch {
                    task_id: task.id,
                    vendor: task.vendor,
                    seed_url: task.seed_url,
                    outcome: result.outcome,
                    products: result.products,
                    attempts: task.attempts,
                    challenge: result.challenge,
                    partial: result.partial,
                })
                .await;

            if outcome.fatal.is_some() {
                break;
            }
        }
        outcome
    }

    fn should_escalate(
        &self,
        profile: &SiteProfile,
        strategy: FetchStrategy,
        escalated: bool,
        kind: FailureKind,
    ) -> bool {
        self.config.retry.escalate
            && !escalated
            && strategy == FetchStrategy::Http
            && profile.complexity_tier == ComplexityTier::Simple
            && !matches!(
                kind,
                FailureKind::ParseError | FailureKind::ChallengeUnresolved
            )
    }

    async fn run_task(
        &self,
        profile: &SiteProfile,
        pipeline: &ExtractionPipeline,
        task: &mut ScrapeTask,
        probe: bool,
        cancel: &CancellationToken,
    ) -> TaskResult {
        let mut collector = Collector::new(pipeline, &profile.domain);
        let mut strategy = profile.effective_strategy();
        let mut retries = 0u32;
        let mut escalated = false;

        loop {
            if let Err(e) = self
                .pacer
                .acquire(&profile.domain, &profile.rate_limit, cancel)
                .await
            {
                return failed_task(collector, AttemptFailure::from(e));
            }

            let started_at = Utc::now();
            let clock = std::time::Instant::now();
            let result = self
                .attempt(profile, strategy, &task.seed_url, &mut collector, cancel)
                .await;

            let (outcome, status, detail) = match &result {
                Ok(out) => {
                    let (outcome, detail) = collector.classify(out.error.as_ref());
                    (outcome, out.status, detail)
                }
                Err(f) => (
                    FetchOutcome::from(f.error.kind()),
                    f.status,
                    Some(f.error.to_string()),
                ),
            };
            let attempt = FetchAttempt {
                strategy_used: strategy,
                started_at,
                duration_ms: clock.elapsed().as_millis() as u64,
                http_status: status,
                outcome,
                retry_count: retries,
                detail,
            };
            self.metrics.record_attempt(&profile.domain, &attempt);
            task.record(attempt);

            let failure = match result {
                Ok(out) => {
                    let partial = out.error.is_some();
                    let error = match out.error {
                        Some(e) => Some(e),
                        None if outcome == FetchOutcome::ParseError => collector.parse_error.take(),
                        None => None,
                    };
                    return TaskResult {
                        outcome,
                        products: collector.products,
                        challenge: out.challenge,
                        partial,
                        error,
                    };
                }
                Err(failure) => failure,
            };

            let kind = failure.error.kind();
            if failure.error.is_fatal()
                || matches!(failure.error, ScrapeError::Cancelled)
                || kind == FailureKind::ChallengeUnresolved
            {
                return failed_task(collector, failure);
            }

            // A half-open probe is exactly one attempt.
            let budget = if escalated || probe {
                0
            } else {
                retry_budget(&self.config.retry, kind)
            };
            if retries < budget {
                let delay = backoff_delay(&self.config.retry, retries, &mut rand::thread_rng());
                retries += 1;
                warn!(
                    "{}: {} attempt failed ({}), retry {}/{} in {:?}",
                    profile.domain, strategy, failure.error, retries, budget, delay
                );
                if let Err(e) = pause(delay, cancel).await {
                    return failed_task(collector, AttemptFailure::from(e));
                }
                continue;
            }

            if !probe && self.should_escalate(profile, strategy, escalated, kind) {
                if let Some(next) = strategy.escalate() {
                    info!(
                        "{}: escalating {} from {} to {} after {}",
                        profile.domain, task.seed_url, strategy, next, kind
                    );
                    escalated = true;
                    strategy = next;
                    retries = 0;
                    continue;
                }
            }

            return failed_task(collector, failure);
        }
    }

    /// One fetch + challenge check + pagination pass, bounded by the task timeout.
    async fn attempt(
        &self,
        profile: &SiteProfile,
        strategy: FetchStrategy,
        url: &str,
        collector: &mut Collector<'_>,
        cancel: &CancellationToken,
    ) -> Result<AttemptOutput, AttemptFailure> {
        let deadline = tokio::time::Instant::now() + self.config.task_timeout();

        let _permit = tokio::select! {
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled.into()),
            permit = self.permits.acquire() => permit.map_err(|_| {
                ScrapeError::ResourceExhausted("fetch permits closed".to_string())
            })?,
        };

        let lease = if strategy.is_browser() {
            Some(
                self.sessions
                    .acquire(strategy == FetchStrategy::Stealth, cancel)
                    .await?,
            )
        } else {
            None
        };

        let driver = self.drivers.get(strategy);
        let fetched = tokio::select! {
            _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
            r = tokio::time::timeout_at(deadline, driver.fetch(url, profile, lease.as_ref())) => {
                r.unwrap_or_else(|_| Err(ScrapeError::Timeout(format!("fetching {}", url))))
            }
        };
        self.pacer.complete(&profile.domain).await;

        let FetchedPage {
            content,
            status,
            mut page,
            ..
        } = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                if let Some(lease) = &lease {
                    if matches!(
                        e.kind(),
                        FailureKind::NetworkError | FailureKind::Timeout | FailureKind::Blocked
                    ) {
                        lease.report(false).await;
                    }
                }
                return Err(e.into());
            }
        };
        if let Some(lease) = &lease {
            lease.report(true).await;
        }

        let processed = tokio::select! {
            _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
            r = tokio::time::timeout_at(
                deadline,
                self.process_page(profile, strategy, &mut *page, content, status, collector, cancel),
            ) => r.map_err(|_| {
                ScrapeError::Timeout(format!("task timeout while paginating {}", url))
            }),
        };
        page.close().await;

        match processed {
            Ok(result) => result,
            Err(error) => {
                if collector.pages > 0 {
                    Ok(AttemptOutput {
                        status,
                        challenge: None,
                        error: Some(error),
                    })
                } else {
                    Err(AttemptFailure {
                        error,
                        status,
                        challenge: None,
                    })
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_page(
        &self,
        profile: &SiteProfile,
        strategy: FetchStrategy,
        page: &mut dyn PageHandle,
        mut content: String,
        status: Option<u16>,
        collector: &mut Collector<'_>,
        cancel: &CancellationToken,
    ) -> Result<AttemptOutput, AttemptFailure> {
        let mut challenge = None;
        if strategy.is_browser() {
            match self.challenges.check(page).await {
                ChallengeVerdict::Clear => {}
                ChallengeVerdict::Resolved(record) => {
                    content = page.content().await.map_err(|error| AttemptFailure {
                        error,
                        status,
                        challenge: Some(record.clone()),
                    })?;
                    challenge = Some(record);
                }
                ChallengeVerdict::Unresolved(record) => {
                    return Err(AttemptFailure {
                        error: ScrapeError::ChallengeUnresolved(
                            record.challenge_type.as_str().to_string(),
                        ),
                        status,
                        challenge: Some(record),
                    });
                }
            }
        }

        let controller = PaginationController::new(&self.humanizer, cancel).paced(
            &self.pacer,
            &profile.domain,
            &profile.rate_limit,
        );
        let mut on_content = |url: &str, html: &str| collector.accept(url, html);
        let report = controller
            .run(profile, page, &content, &mut on_content)
            .await;

        Ok(AttemptOutput {
            status,
            challenge,
            error: report.error,
        })
    }
}

fn failed_task(collector: Collector<'_>, failure: AttemptFailure) -> TaskResult {
    TaskResult {
        outcome: FetchOutcome::from(failure.error.kind()),
        products: collector.products,
        challenge: failure.challenge,
        partial: false,
        error: Some(failure.error),
    }
}
