//! Browser-based drivers for JavaScript-heavy and hostile storefronts.
//!
//! Uses chromiumoxide (CDP). One Chrome process is shared by the plain and
//! stealth drivers. Stealth sessions get their own browser context (with the
//! leased proxy), a device fingerprint, init scripts that mask automation
//! signals, and request interception.

use std::path::PathBuf;
use std::sync::Arc;
#[cfg(feature = "browser")]
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tokio::sync::{Mutex, OnceCell};
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetLocaleOverrideParams, SetTimezoneOverrideParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::fetch::{
    AuthChallengeResponse, AuthChallengeResponseResponse, ContinueRequestParams,
    ContinueWithAuthParams, EnableParams as FetchEnableParams, EventAuthRequired,
    EventRequestPaused, FailRequestParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType,
};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, SetUserAgentOverrideParams};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, NavigateParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

use super::{FetchDriver, FetchedPage, SessionLease};
#[cfg(feature = "browser")]
use super::{ControlState, PageHandle};
use crate::config::{BrowserEngineConfig, FetchStrategy, SiteProfile};
use crate::error::ScrapeError;
#[cfg(feature = "browser")]
use crate::stealth::{
    automation_flag_script, stealth_scripts, AntiDetectionProfile, FilterDecision,
    ResourceKind,
};
use crate::stealth::RequestFilter;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Find a Chrome executable: explicit path, known locations, then `which`.
pub fn find_chrome(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.clone());
    }
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }
    [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ]
    .iter()
    .find_map(|cmd| which::which(cmd).ok())
}

/// Turn a DevTools URL into the `/json/version` discovery endpoint.
pub fn version_endpoint(remote_url: &str) -> String {
    let http_url = remote_url
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    format!("{}/json/version", http_url.trim_end_matches('/'))
}

/// JS string literal for embedding selectors in evaluated scripts.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// The shared Chrome process, launched or connected on first use.
pub struct BrowserHost {
    config: BrowserEngineConfig,
    #[cfg(feature = "browser")]
    browser: OnceCell<Arc<Mutex<Browser>>>,
}

impl BrowserHost {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self {
            config,
            #[cfg(feature = "browser")]
            browser: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &BrowserEngineConfig {
        &self.config
    }
}

#[cfg(feature = "browser")]
impl BrowserHost {
    /// Launch or connect to the browser if not already running.
    ///
    /// Failure here means no browser session can be allocated at all.
    async fn browser(&self) -> Result<Arc<Mutex<Browser>>, ScrapeError> {
        self.browser
            .get_or_try_init(|| async {
                let browser = match self.config.remote_url.clone() {
                    Some(remote_url) => self.connect_remote(&remote_url).await,
                    None => self.launch().await,
                };
                browser.map(|b| Arc::new(Mutex::new(b)))
            })
            .await
            .cloned()
    }

    async fn launch(&self) -> Result<Browser, ScrapeError> {
        info!("Launching browser (headless={})", self.config.headless);

        let chrome_path = find_chrome(self.config.chrome_path.as_ref()).ok_or_else(|| {
            ScrapeError::ResourceExhausted(
                "Chrome/Chromium not found; install it or set browser.remote_url".to_string(),
            )
        })?;
        info!("Using Chrome at {}", chrome_path.display());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .viewport(None);

        // Set headless mode (with_head means NOT headless)
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg("--safebrowsing-disable-auto-update")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(|e| {
            ScrapeError::ResourceExhausted(format!("Failed to build browser config: {}", e))
        })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            ScrapeError::ResourceExhausted(format!("Failed to launch browser: {}", e))
        })?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    async fn connect_remote(&self, url: &str) -> Result<Browser, ScrapeError> {
        info!("Connecting to remote browser at {}", url);

        let resp: serde_json::Value = reqwest::Client::new()
            .get(version_endpoint(url))
            .send()
            .await
            .map_err(|e| {
                ScrapeError::ResourceExhausted(format!("Remote browser unreachable: {}", e))
            })?
            .json()
            .await
            .map_err(|e| {
                ScrapeError::ResourceExhausted(format!("Bad browser version info: {}", e))
            })?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ScrapeError::ResourceExhausted("No webSocketDebuggerUrl in response".to_string())
            })?;

        info!("Connecting to WebSocket: {}", ws_url);
        let (browser, mut handler) = Browser::connect(ws_url).await.map_err(|e| {
            ScrapeError::ResourceExhausted(format!("Failed to connect to remote browser: {}", e))
        })?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    /// Close the browser if it was started.
    pub async fn shutdown(&self) {
        if let Some(browser) = self.browser.get() {
            let mut browser = browser.lock().await;
            if let Err(e) = browser.close().await {
                debug!("Browser close failed: {}", e);
            }
        }
    }
}

#[cfg(not(feature = "browser"))]
impl BrowserHost {
    pub async fn shutdown(&self) {}
}

/// Browser fetch strategy; `stealth` selects the anti-detection variant.
pub struct BrowserFetcher {
    host: Arc<BrowserHost>,
    stealth: bool,
    filter: RequestFilter,
    #[cfg_attr(not(feature = "browser"), allow(dead_code))]
    list_wait: std::time::Duration,
}

impl BrowserFetcher {
    pub fn new(
        host: Arc<BrowserHost>,
        stealth: bool,
        filter: RequestFilter,
        list_wait: std::time::Duration,
    ) -> Self {
        Self {
            host,
            stealth,
            filter,
            list_wait,
        }
    }
}

#[cfg(feature = "browser")]
const READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

#[cfg(feature = "browser")]
impl BrowserFetcher {
    async fn open_page(
        &self,
        lease: &SessionLease,
    ) -> Result<(Page, Option<BrowserContextId>), ScrapeError> {
        let browser = self.host.browser().await?;
        let browser = browser.lock().await;

        let context_id = if self.stealth {
            let mut params = CreateBrowserContextParams::builder().dispose_on_detach(true);
            if let Some(proxy) = &lease.proxy {
                params = params.proxy_server(proxy.server.clone());
            }
            let created = browser.execute(params.build()).await?;
            Some(created.result.browser_context_id.clone())
        } else {
            None
        };

        let mut target = CreateTargetParams::builder().url("about:blank");
        if let Some(id) = &context_id {
            target = target.browser_context_id(id.clone());
        }
        let target = target
            .build()
            .map_err(|e| ScrapeError::Browser(format!("Invalid target params: {}", e)))?;
        let page = browser.new_page(target).await?;
        Ok((page, context_id))
    }

    /// Apply the lease's fingerprint before any navigation.
    async fn prepare_page(&self, page: &Page, lease: &SessionLease) -> Result<(), ScrapeError> {
        let fp = &lease.fingerprint;

        let mut ua = SetUserAgentOverrideParams::new(fp.user_agent.to_string());
        ua.accept_language = Some(fp.languages.join(","));
        ua.platform = Some(fp.platform.to_string());
        page.execute(ua).await?;

        page.execute(SetDeviceMetricsOverrideParams::new(
            fp.viewport_width as i64,
            fp.viewport_height as i64,
            fp.device_scale_factor,
            false,
        ))
        .await?;

        if !self.stealth {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
                automation_flag_script().to_string(),
            ))
            .await?;
            return Ok(());
        }

        if let Err(e) = page
            .execute(SetTimezoneOverrideParams::new(fp.timezone.to_string()))
            .await
        {
            debug!("Timezone override skipped: {}", e);
        }
        if let Err(e) = page
            .execute(SetLocaleOverrideParams::builder().locale(fp.locale.to_string()).build())
            .await
        {
            debug!("Locale override skipped: {}", e);
        }
        for script in stealth_scripts(fp) {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
                .await?;
        }

        self.install_interception(page, lease).await
    }

    /// Route every request through the filter; answer proxy auth challenges.
    async fn install_interception(
        &self,
        page: &Page,
        lease: &SessionLease,
    ) -> Result<(), ScrapeError> {
        let credentials = lease
            .proxy
            .as_ref()
            .filter(|p| p.has_credentials())
            .map(|p| (p.username.clone(), p.password.clone()));

        let mut paused = page.event_listener::<EventRequestPaused>().await?;
        let filter = self.filter.clone();
        let interceptor = page.clone();
        tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let kind = ResourceKind::from_cdp(&format!("{:?}", event.resource_type));
                let decision = filter.decide(&event.request.url, kind);
                let result = match decision {
                    FilterDecision::Allow => interceptor
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ()),
                    FilterDecision::BlockTracker | FilterDecision::DropResource => interceptor
                        .execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ()),
                };
                if result.is_err() {
                    break;
                }
            }
        });

        if let Some((username, password)) = credentials.clone() {
            let mut auth = page.event_listener::<EventAuthRequired>().await?;
            let responder = page.clone();
            tokio::spawn(async move {
                while let Some(event) = auth.next().await {
                    let mut response =
                        AuthChallengeResponse::new(AuthChallengeResponseResponse::ProvideCredentials);
                    response.username = username.clone();
                    response.password = password.clone();
                    if responder
                        .execute(ContinueWithAuthParams::new(event.request_id.clone(), response))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            });
        }

        page.execute(
            FetchEnableParams::builder()
                .handle_auth_requests(credentials.is_some())
                .build(),
        )
        .await?;
        Ok(())
    }
}

/// Bound one navigation by the configured page-load timeout.
#[cfg(feature = "browser")]
async fn within_page_load<T, F>(limit: Duration, url: &str, fut: F) -> Result<T, ScrapeError>
where
    F: std::future::Future<Output = Result<T, ScrapeError>>,
{
    tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
        Err(ScrapeError::Timeout(format!(
            "page load exceeded {:?} for {}",
            limit, url
        )))
    })
}

/// Navigate, wait for the document, then bound-wait for the list selector.
#[cfg(feature = "browser")]
async fn navigate_and_wait(
    page: &Page,
    url: &str,
    list_selector: Option<&str>,
    list_wait: Duration,
    page_load: Duration,
) -> Result<String, ScrapeError> {
    debug!("Navigating to {}", url);
    let nav_params = NavigateParams::builder()
        .url(url)
        .build()
        .map_err(|e| ScrapeError::Browser(format!("Invalid URL {}: {}", url, e)))?;
    let nav = within_page_load(page_load, url, async {
        Ok::<_, ScrapeError>(page.execute(nav_params).await?)
    })
    .await?;
    if let Some(error) = &nav.result.error_text {
        return Err(ScrapeError::Network(format!("{} ({})", error, url)));
    }

    match tokio::time::timeout(list_wait, page.evaluate(READY_SCRIPT.to_string())).await {
        Ok(Ok(result)) => {
            let state: String = result
                .into_value()
                .unwrap_or_else(|_| "unknown".to_string());
            debug!("Page ready state: {}", state);
        }
        Ok(Err(e)) => debug!("Could not check ready state: {}", e),
        Err(_) => warn!("Timeout waiting for page ready state on {}", url),
    }

    if let Some(selector) = list_selector {
        let deadline = tokio::time::Instant::now() + list_wait;
        loop {
            if page.find_element(selector).await.is_ok() {
                debug!("List selector {} present", selector);
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("List selector {} not found within {:?} on {}", selector, list_wait, url);
                break;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    Ok(page.content().await?)
}

#[async_trait]
impl FetchDriver for BrowserFetcher {
    fn strategy(&self) -> FetchStrategy {
        if self.stealth {
            FetchStrategy::Stealth
        } else {
            FetchStrategy::Browser
        }
    }

    #[cfg(feature = "browser")]
    async fn fetch(
        &self,
        url: &str,
        profile: &SiteProfile,
        session: Option<&SessionLease>,
    ) -> Result<FetchedPage, ScrapeError> {
        let lease = session.ok_or_else(|| {
            ScrapeError::Browser("browser fetch requires a session lease".to_string())
        })?;
        let (page, context_id) = self.open_page(lease).await?;

        let mut handle = BrowserPage {
            host: self.host.clone(),
            page: Some(page),
            context_id,
            url: url.to_string(),
            list_selector: profile.selectors.list.clone(),
            list_wait: self.list_wait,
            fingerprint: lease.fingerprint.clone(),
        };

        let loaded = async {
            let page = handle.page()?;
            self.prepare_page(page, lease).await?;
            let content =
                navigate_and_wait(
                    page,
                    url,
                    handle.list_selector.as_deref(),
                    self.list_wait,
                    self.host.config().page_load_timeout(),
                )
                .await?;
            let final_url = page
                .url()
                .await?
                .unwrap_or_else(|| url.to_string());
            Ok::<_, ScrapeError>((content, final_url))
        }
        .await;

        match loaded {
            Ok((content, final_url)) => {
                handle.url = final_url.clone();
                Ok(FetchedPage {
                    content,
                    final_url,
                    status: None,
                    page: Box::new(handle),
                })
            }
            Err(e) => {
                handle.close().await;
                Err(e)
            }
        }
    }

    #[cfg(not(feature = "browser"))]
    async fn fetch(
        &self,
        _url: &str,
        _profile: &SiteProfile,
        _session: Option<&SessionLease>,
    ) -> Result<FetchedPage, ScrapeError> {
        let _ = (&self.host, &self.filter);
        Err(ScrapeError::ResourceExhausted(
            "Browser support not compiled in; rebuild with --features browser".to_string(),
        ))
    }
}

/// A live browser tab.
#[cfg(feature = "browser")]
pub struct BrowserPage {
    host: Arc<BrowserHost>,
    page: Option<Page>,
    context_id: Option<BrowserContextId>,
    url: String,
    list_selector: Option<String>,
    list_wait: Duration,
    fingerprint: AntiDetectionProfile,
}

#[cfg(feature = "browser")]
impl BrowserPage {
    fn page(&self) -> Result<&Page, ScrapeError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::Browser("page already closed".to_string()))
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, js: String) -> Result<T, ScrapeError> {
        self.page()?
            .evaluate(js)
            .await?
            .into_value::<T>()
            .map_err(|e| ScrapeError::Browser(format!("Unexpected script result: {}", e)))
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageHandle for BrowserPage {
    fn url(&self) -> &str {
        &self.url
    }

    fn viewport(&self) -> (u32, u32) {
        (self.fingerprint.viewport_width, self.fingerprint.viewport_height)
    }

    fn supports_interaction(&self) -> bool {
        true
    }

    async fn content(&mut self) -> Result<String, ScrapeError> {
        Ok(self.page()?.content().await?)
    }

    async fn navigate(&mut self, url: &str) -> Result<String, ScrapeError> {
        let content = navigate_and_wait(
            self.page()?,
            url,
            self.list_selector.as_deref(),
            self.list_wait,
            self.host.config().page_load_timeout(),
        )
        .await?;
        self.url = self
            .page()?
            .url()
            .await?
            .unwrap_or_else(|| url.to_string());
        Ok(content)
    }

    async fn title(&mut self) -> Result<String, ScrapeError> {
        self.eval("document.title || ''".to_string()).await
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, ScrapeError> {
        self.eval(format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const r = el.getBoundingClientRect();
                const s = window.getComputedStyle(el);
                return r.width > 0 && r.height > 0 && s.visibility !== 'hidden'
                    && s.display !== 'none' && s.opacity !== '0';
            }})()"#,
            sel = js_string(selector)
        ))
        .await
    }

    async fn attribute(
        &mut self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, ScrapeError> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.getAttribute({}) : null; }})()",
            js_string(selector),
            js_string(name)
        ))
        .await
    }

    async fn capture_element(&mut self, selector: &str) -> Result<Option<Vec<u8>>, ScrapeError> {
        let page = self.page()?;
        let Ok(element) = page.find_element(selector).await else {
            return Ok(None);
        };
        Ok(Some(element.screenshot(CaptureScreenshotFormat::Png).await?))
    }

    async fn scroll_height(&mut self) -> Result<u64, ScrapeError> {
        let height: f64 = self
            .eval("document.documentElement.scrollHeight || document.body.scrollHeight".to_string())
            .await?;
        Ok(height.max(0.0) as u64)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), ScrapeError> {
        self.page()?
            .evaluate("window.scrollTo(0, document.documentElement.scrollHeight)")
            .await?;
        Ok(())
    }

    async fn scroll_by(&mut self, dy: i64) -> Result<(), ScrapeError> {
        self.page()?
            .evaluate(format!("window.scrollBy({{ top: {}, behavior: 'smooth' }})", dy))
            .await?;
        Ok(())
    }

    async fn move_pointer(&mut self, x: f64, y: f64) -> Result<(), ScrapeError> {
        self.page()?
            .execute(DispatchMouseEventParams::new(
                DispatchMouseEventType::MouseMoved,
                x,
                y,
            ))
            .await?;
        Ok(())
    }

    async fn control_state(&mut self, selector: &str) -> Result<ControlState, ScrapeError> {
        let state: String = self
            .eval(format!(
                r#"(() => {{
                    const el = document.querySelector({sel});
                    if (!el) return 'missing';
                    const r = el.getBoundingClientRect();
                    const s = window.getComputedStyle(el);
                    if (r.width === 0 || r.height === 0 || s.visibility === 'hidden' || s.display === 'none') return 'hidden';
                    if (el.disabled || el.getAttribute('aria-disabled') === 'true' || el.classList.contains('disabled')) return 'disabled';
                    return 'ready';
                }})()"#,
                sel = js_string(selector)
            ))
            .await?;
        Ok(match state.as_str() {
            "ready" => ControlState::Ready,
            "disabled" => ControlState::Disabled,
            "hidden" => ControlState::Hidden,
            _ => ControlState::Missing,
        })
    }

    async fn click(&mut self, selector: &str) -> Result<(), ScrapeError> {
        self.page()?.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Failed to close page for {}: {}", self.url, e);
            }
        }
        if let Some(id) = self.context_id.take() {
            if let Ok(browser) = self.host.browser().await {
                let browser = browser.lock().await;
                if let Err(e) = browser.execute(DisposeBrowserContextParams::new(id)).await {
                    debug!("Failed to dispose browser context: {}", e);
                }
            }
        }
    }
}
