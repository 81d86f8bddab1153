//! Navigation actions, page loading on both engines, and tab management.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::{BrowserTool, CallOptions, Outcome};
use crate::driver::LivePage;
use crate::engine::{Engine, EngineDecision, TabBacking};
use crate::error::BrowserError;
use crate::fetch::PageRequest;
use crate::snapshot::{
    build_document_snapshot, build_live_snapshot, DocumentCapture, LiveCapture, ProbeRow, Snapshot,
    SnapshotLimits, PROBE_SCRIPT,
};
use crate::tabs::validate_url;

/// A page load that may have fallen back from live to fetch.
pub(crate) struct Loaded {
    pub engine: Engine,
    pub snapshot: Arc<Snapshot>,
    /// Error of the live attempt when the load fell back.
    pub fallback_reason: Option<String>,
}

impl Loaded {
    pub(crate) fn outcome(self, tab_id: &str, decision: &EngineDecision) -> Outcome {
        let mut outcome = Outcome::on(self.engine, tab_id)
            .with_snapshot(Some(self.snapshot))
            .with_decision(decision);
        if let Some(reason) = self.fallback_reason {
            outcome.fallback_from = Some(Engine::Live);
            outcome.fallback_reason = Some(reason);
        }
        outcome
    }
}

fn is_web(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

impl BrowserTool {
    // ------------------------------------------------------------------
    // Fetch engine
    // ------------------------------------------------------------------

    /// Run `request` with the tab's jar and make the response its snapshot.
    /// Cookies set along the way are kept even when the load fails.
    pub(crate) async fn fetch_load(
        &self,
        tab_id: &str,
        request: PageRequest,
        call: &CallOptions,
    ) -> Result<Arc<Snapshot>, BrowserError> {
        let mut jar = self.state.lock().get(tab_id)?.cookies.clone();
        let request = request.with_max_body(call.limits.max_bytes);
        debug!("fetch {} {} (tab {})", request.method.as_str(), request.url, tab_id);
        let result = self
            .fetch
            .load_with_retries(&mut jar, request, call.navigation_timeout, call.retries)
            .await;

        let mut state = self.state.lock();
        let tab = state.get_mut(tab_id)?;
        tab.cookies = jar;
        let page = result?;
        let (snapshot, forms, raw) = build_document_snapshot(
            DocumentCapture {
                url: &page.url,
                status: page.status,
                content_type: &page.content_type,
                body: &page.body,
                total_bytes: page.total_bytes,
            },
            &call.limits,
            &mut tab.refs,
        );
        Ok(tab.apply_snapshot(snapshot, forms, Some(raw)))
    }

    /// Fetch the tab's current URL again.
    pub(crate) async fn refetch(&self, tab_id: &str, call: &CallOptions) -> Result<Arc<Snapshot>, BrowserError> {
        let url = validate_url(&self.state.lock().get(tab_id)?.url)?;
        self.fetch_load(tab_id, PageRequest::get(url), call).await
    }

    /// The tab's snapshot, fetching one first if it has none.
    pub(crate) async fn ensure_snapshot(&self, tab_id: &str, call: &CallOptions) -> Result<Arc<Snapshot>, BrowserError> {
        match self.current_snapshot(tab_id) {
            Some(snapshot) => Ok(snapshot),
            None => self.refetch(tab_id, call).await,
        }
    }

    // ------------------------------------------------------------------
    // Live engine
    // ------------------------------------------------------------------

    /// Snapshot the live page of `tab_id`. With `follow`, a URL change made
    /// by the page itself is pushed onto the tab's history first.
    pub(crate) async fn capture_live(
        &self,
        tab_id: &str,
        page: &Arc<dyn LivePage>,
        status: Option<u16>,
        limits: &SnapshotLimits,
        follow: bool,
    ) -> Result<Arc<Snapshot>, BrowserError> {
        let raw_url = page.url().await?;
        let title = page.title().await.unwrap_or_default();
        let html = page.content().await?;
        let rows: Vec<ProbeRow> = match page.evaluate(PROBE_SCRIPT).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("Element probe returned unexpected rows: {}", e);
                Vec::new()
            }),
            Err(e) => {
                warn!("Element probe failed on tab {}: {}", tab_id, e);
                Vec::new()
            }
        };
        let cookies = match page.cookies().await {
            Ok(cookies) => Some(cookies),
            Err(e) => {
                debug!("Reading cookies of tab {} failed: {}", tab_id, e);
                None
            }
        };
        let url = Url::parse(&raw_url).unwrap_or_else(|_| super::blank_url());

        let mut state = self.state.lock();
        if follow && is_web(&url) && state.get(tab_id)?.url != url.as_str() {
            state.navigate(tab_id, &url)?;
        }
        let tab = state.get_mut(tab_id)?;
        if let Some(cookies) = cookies {
            tab.cookies.replace_all(cookies);
        }
        let status = status.or(tab.last_status).unwrap_or(200);
        let (snapshot, forms) = build_live_snapshot(
            LiveCapture {
                url: &url,
                title: &title,
                status,
                html: &html,
                rows,
            },
            limits,
            &mut tab.refs,
        );
        Ok(tab.apply_snapshot(snapshot, forms, None))
    }

    async fn live_goto(&self, tab_id: &str, url: &Url, call: &CallOptions) -> Result<Arc<Snapshot>, BrowserError> {
        let page = self.live.open_page(tab_id).await?;
        let status = page.goto(url.as_str(), call.navigation_timeout).await?;
        self.capture_live(tab_id, &page, status, &call.limits, false).await
    }

    /// The live page of `tab_id`. A tab without one gets a fresh page loaded
    /// with its current URL.
    pub(crate) async fn ensure_live_page(
        &self,
        tab_id: &str,
        call: &CallOptions,
    ) -> Result<Arc<dyn LivePage>, BrowserError> {
        if let Some(page) = self.live.page(tab_id) {
            return Ok(page);
        }
        let raw = self.state.lock().get(tab_id)?.url.clone();
        let page = self.live.open_page(tab_id).await?;
        let Ok(url) = Url::parse(&raw) else {
            return Ok(page);
        };
        if is_web(&url) {
            debug!("Moving tab {} onto the live engine", tab_id);
            let loaded = match page.goto(url.as_str(), call.navigation_timeout).await {
                Ok(status) => self.capture_live(tab_id, &page, status, &call.limits, false).await,
                Err(e) => Err(e),
            };
            if let Err(e) = loaded {
                self.live.close(tab_id).await;
                return Err(e);
            }
        }
        Ok(page)
    }

    /// Apply the navigation fallback policy to a live attempt.
    async fn settle_live(
        &self,
        tab_id: &str,
        url: &Url,
        call: &CallOptions,
        attempt: Result<Arc<Snapshot>, BrowserError>,
    ) -> Result<Loaded, BrowserError> {
        match attempt {
            Ok(snapshot) => Ok(Loaded {
                engine: Engine::Live,
                snapshot,
                fallback_reason: None,
            }),
            Err(e) if e.is_transient() && call.allow_fallback => {
                warn!("Live navigation of tab {} failed, retrying with fetch: {}", tab_id, e);
                self.live.close(tab_id).await;
                let snapshot = self.fetch_load(tab_id, PageRequest::get(url.clone()), call).await?;
                Ok(Loaded {
                    engine: Engine::Fetch,
                    snapshot,
                    fallback_reason: Some(e.to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Load `url` into `tab_id` without touching history.
    pub(crate) async fn load_page(
        &self,
        tab_id: &str,
        url: &Url,
        engine: Engine,
        referer: Option<String>,
        call: &CallOptions,
    ) -> Result<Loaded, BrowserError> {
        match engine {
            Engine::Fetch => {
                let mut request = PageRequest::get(url.clone());
                if let Some(referer) = referer {
                    request = request.with_referer(referer);
                }
                Ok(Loaded {
                    engine: Engine::Fetch,
                    snapshot: self.fetch_load(tab_id, request, call).await?,
                    fallback_reason: None,
                })
            }
            Engine::Live => {
                let attempt = self.live_goto(tab_id, url, call).await;
                self.settle_live(tab_id, url, call, attempt).await
            }
        }
    }

    // ------------------------------------------------------------------
    // Navigation actions
    // ------------------------------------------------------------------

    pub(super) async fn open(&self, call: &CallOptions, raw_url: &str, background: bool) -> Result<Outcome, BrowserError> {
        let url = validate_url(raw_url)?;
        let decision = self.decide(call, None)?;
        let (tab_id, previous) = {
            let mut state = self.state.lock();
            let previous = state.active_id().map(str::to_string);
            let id = if background {
                state.create_background_tab(&url)
            } else {
                state.create_tab(&url)
            };
            (id, previous)
        };
        debug!("Opened tab {} for {} on {}", tab_id, url, decision.engine);

        match self.load_page(&tab_id, &url, decision.engine, None, call).await {
            Ok(loaded) => Ok(loaded.outcome(&tab_id, &decision)),
            Err(e) => {
                self.live.close(&tab_id).await;
                let mut state = self.state.lock();
                if state.close(&tab_id).is_ok() {
                    if let Some(previous) = previous {
                        if let Err(focus_err) = state.focus(&previous) {
                            debug!("Restoring focus after failed open: {}", focus_err);
                        }
                    }
                }
                Err(e)
            }
        }
    }

    pub(super) async fn navigate(&self, call: &CallOptions, raw_url: &str) -> Result<Outcome, BrowserError> {
        let url = validate_url(raw_url)?;
        let resolved = self.state.lock().resolve_id(call.tab_id.as_deref());
        let tab_id = match resolved {
            Ok(id) => id,
            Err(BrowserError::NoActiveTab) => return self.open(call, raw_url, false).await,
            Err(e) => return Err(e),
        };
        let decision = self.decide(call, Some(&tab_id))?;
        let referer = self.current_snapshot(&tab_id).map(|s| s.url.clone());
        self.state.lock().navigate(&tab_id, &url)?;
        let loaded = self.load_page(&tab_id, &url, decision.engine, referer, call).await?;
        Ok(loaded.outcome(&tab_id, &decision))
    }

    pub(super) async fn reload(&self, call: &CallOptions) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.target(call)?;
        let url = validate_url(&self.state.lock().get(&tab_id)?.url)?;
        let loaded = match decision.engine {
            Engine::Fetch => self.load_page(&tab_id, &url, Engine::Fetch, None, call).await?,
            Engine::Live => match self.live.page(&tab_id) {
                Some(page) => {
                    let attempt = match page.reload(call.navigation_timeout).await {
                        Ok(status) => self.capture_live(&tab_id, &page, status, &call.limits, false).await,
                        Err(e) => Err(e),
                    };
                    self.settle_live(&tab_id, &url, call, attempt).await?
                }
                None => self.load_page(&tab_id, &url, Engine::Live, None, call).await?,
            },
        };
        Ok(loaded.outcome(&tab_id, &decision))
    }

    /// `back` (`forward = false`) or `forward`. A move past either end of
    /// the history is reported, not raised. A failed load leaves the tab
    /// where it was.
    pub(super) async fn history(&self, call: &CallOptions, forward: bool) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.target(call)?;
        let (step, saved) = {
            let mut state = self.state.lock();
            let saved = state.get(&tab_id)?.position();
            let step = if forward {
                state.forward(&tab_id)?
            } else {
                state.back(&tab_id)?
            };
            (step, saved)
        };

        if !step.moved {
            let outcome = Outcome::on(decision.engine, &tab_id)
                .with_snapshot(self.current_snapshot(&tab_id))
                .with_decision(&decision)
                .with("moved", false)
                .with("url", step.url)
                .with("reason", step.reason.unwrap_or_default());
            return Ok(outcome);
        }

        let loaded = match Url::parse(&step.url) {
            Ok(url) => self.load_page(&tab_id, &url, decision.engine, None, call).await,
            Err(e) => Err(BrowserError::InvalidUrl(format!("{}: {}", step.url, e))),
        };
        match loaded {
            Ok(loaded) => Ok(loaded.outcome(&tab_id, &decision).with("moved", true)),
            Err(e) => {
                debug!("History move on {} failed, staying put: {}", tab_id, e);
                if let Ok(tab) = self.state.lock().get_mut(&tab_id) {
                    tab.restore_position(saved);
                }
                Err(e)
            }
        }
    }

    pub(super) async fn snapshot(&self, call: &CallOptions) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.target(call)?;
        match (decision.engine, self.live.page(&tab_id)) {
            (Engine::Live, Some(page)) => {
                let snapshot = self.capture_live(&tab_id, &page, None, &call.limits, true).await?;
                Ok(Outcome::on(Engine::Live, &tab_id)
                    .with_snapshot(Some(snapshot))
                    .with_decision(&decision))
            }
            (engine, _) => {
                let url = validate_url(&self.state.lock().get(&tab_id)?.url)?;
                let loaded = self.load_page(&tab_id, &url, engine, None, call).await?;
                Ok(loaded.outcome(&tab_id, &decision))
            }
        }
    }

    // ------------------------------------------------------------------
    // Tab management
    // ------------------------------------------------------------------

    pub(super) fn tabs(&self) -> Outcome {
        let state = self.state.lock();
        Outcome {
            tab_id: state.active_id().map(str::to_string),
            ..Outcome::default()
        }
        .with("tabs", json!(state.summaries()))
    }

    pub(super) fn focus(&self, call: &CallOptions) -> Result<Outcome, BrowserError> {
        let tab_id = call
            .tab_id
            .clone()
            .ok_or_else(|| BrowserError::MissingParameter("tabId".to_string()))?;
        self.state.lock().focus(&tab_id)?;
        let engine = match self.backing(Some(&tab_id)) {
            TabBacking::Live => Engine::Live,
            _ => Engine::Fetch,
        };
        Ok(Outcome::on(engine, &tab_id).with_snapshot(self.current_snapshot(&tab_id)))
    }

    pub(super) async fn close(&self, call: &CallOptions) -> Result<Outcome, BrowserError> {
        let tab_id = self.state.lock().resolve_id(call.tab_id.as_deref())?;
        self.live.close(&tab_id).await;
        self.state.lock().close(&tab_id)?;
        debug!("Closed tab {}", tab_id);
        let active = self.state.lock().active_id().map(str::to_string);
        let snapshot = active.as_deref().and_then(|id| self.current_snapshot(id));
        Ok(Outcome {
            tab_id: active,
            snapshot,
            ..Outcome::default()
        }
        .with("closed", tab_id))
    }

    pub(super) async fn reset(&self) -> Outcome {
        self.live.reset().await;
        self.state.lock().reset();
        info!("Browser state reset");
        Outcome::default().with("reset", true)
    }

    pub(super) fn open_external(&self, raw_url: &str) -> Result<Outcome, BrowserError> {
        let url = validate_url(raw_url)?;
        self.launcher
            .open(url.as_str())
            .map_err(|e| BrowserError::ActionFailed(format!("could not open {}: {}", url, e)))?;
        info!("Opened {} in the system browser", url);
        Ok(Outcome::default().with("opened", url.as_str()))
    }
}
