//! The `browser` tool: one entry point, every action.
//!
//! Each call resolves a tab, resolves an engine, performs the action on the
//! fetch engine or the live session, updates the tab registry and answers
//! with one envelope shape:
//!
//! ```json
//! { "ok": true, "action": "click", "engine": "fetch", "activeTabId": "t1",
//!   "tab": { ... }, "snapshot": { ... }, "fallbackFrom": "live", ... }
//! ```

mod interaction;
mod login;
mod navigation;
mod page;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use url::Url;

use webhands_protocols::{
    CredentialStore, ExternalLauncher, RiskLevel, StaticCredentialStore, SystemLauncher, Tool,
    ToolContext, ToolDefinition, ToolError, ToolResult,
};

use crate::action::{ActionRequest, BrowserAction};
use crate::config::BrowserToolConfig;
use crate::driver::LiveDriver;
use crate::engine::{resolve_engine, Engine, EngineDecision, EngineMode, TabBacking};
use crate::error::BrowserError;
use crate::fetch::{FetchEngine, HttpFetcher};
use crate::live::LiveSessionManager;
use crate::params::{self, CommonParams};
use crate::snapshot::{Snapshot, SnapshotLimits};
use crate::tabs::BrowserState;

pub use login::service_candidates;

/// Tool id exposed to agent runtimes.
pub const TOOL_ID: &str = "browser";

/// Per-call settings after clamping.
#[derive(Debug, Clone)]
pub(crate) struct CallOptions {
    pub mode: EngineMode,
    pub allow_fallback: bool,
    pub navigation_timeout: Duration,
    pub action_timeout: Duration,
    pub limits: SnapshotLimits,
    pub retries: u32,
    pub tab_id: Option<String>,
}

/// What an action handler hands back to the envelope builder.
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub engine: Option<Engine>,
    pub tab_id: Option<String>,
    pub snapshot: Option<Arc<Snapshot>>,
    pub fallback_from: Option<Engine>,
    pub fallback_reason: Option<String>,
    pub extra: Map<String, Value>,
}

impl Outcome {
    pub(crate) fn on(engine: Engine, tab_id: impl Into<String>) -> Self {
        Self {
            engine: Some(engine),
            tab_id: Some(tab_id.into()),
            ..Self::default()
        }
    }

    pub(crate) fn with_snapshot(mut self, snapshot: Option<Arc<Snapshot>>) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub(crate) fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Carry a fallback recorded by engine resolution.
    pub(crate) fn with_decision(mut self, decision: &EngineDecision) -> Self {
        if decision.fallback_from.is_some() {
            self.fallback_from = decision.fallback_from;
            self.fallback_reason = decision.reason.clone();
        }
        self
    }
}

/// Dual-engine browser tool.
pub struct BrowserTool {
    definition: ToolDefinition,
    config: BrowserToolConfig,
    state: Mutex<BrowserState>,
    fetch: FetchEngine,
    live: LiveSessionManager,
    credentials: Arc<dyn CredentialStore>,
    launcher: Arc<dyn ExternalLauncher>,
}

impl BrowserTool {
    /// `driver = None` runs fetch-only.
    pub fn new(
        config: BrowserToolConfig,
        http: Arc<dyn HttpFetcher>,
        driver: Option<Arc<dyn LiveDriver>>,
    ) -> Self {
        let live = LiveSessionManager::new(driver, config.launch.clone(), config.buffers);
        Self {
            definition: Self::tool_definition(),
            fetch: FetchEngine::new(http),
            live,
            config,
            state: Mutex::new(BrowserState::new()),
            credentials: Arc::new(StaticCredentialStore::new()),
            launcher: Arc::new(SystemLauncher),
        }
    }

    pub fn with_credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = store;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ExternalLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn config(&self) -> &BrowserToolConfig {
        &self.config
    }

    fn tool_definition() -> ToolDefinition {
        ToolDefinition::new(
            TOOL_ID,
            "Browser",
            "Open, inspect and operate web pages. Pages load over plain HTTP (fetch engine) \
             or in a headless browser (live engine); both expose the same snapshot with \
             element refs (e1, e2, ...) usable by follow-up actions.",
        )
        .with_parameters_schema(json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": [
                        "open", "navigate", "reload", "back", "forward", "snapshot",
                        "click", "fill", "submit", "hover", "press", "select", "drag",
                        "evaluate", "upload", "scroll", "resize", "wait", "screenshot",
                        "pdf", "console", "dialog", "login", "mfa", "act", "tabs",
                        "focus", "close", "reset", "open_external"
                    ]
                },
                "kind": { "type": "string", "description": "Interaction dispatched by act" },
                "tabId": { "type": "string" },
                "engine": { "type": "string", "enum": ["auto", "fetch", "live"] },
                "allowFallback": { "type": "boolean" },
                "url": { "type": "string" },
                "ref": { "type": "string" },
                "selector": { "type": "string" },
                "formIndex": { "type": "integer", "minimum": 1 },
                "field": { "type": "string" },
                "value": { "type": "string" },
                "timeoutMs": { "type": "number", "minimum": 500, "maximum": 120000 },
                "maxChars": { "type": "number", "minimum": 200, "maximum": 200000 },
                "maxBytes": { "type": "number", "minimum": 1024, "maximum": 20000000 },
                "maxLinks": { "type": "number", "minimum": 0, "maximum": 500 },
                "retries": { "type": "number", "minimum": 0, "maximum": 3 }
            },
            "required": ["action"]
        }))
        .with_risk_level(RiskLevel::Medium)
    }

    fn call_options(&self, common: &CommonParams) -> Result<CallOptions, BrowserError> {
        let limits = &self.config.limits;
        Ok(CallOptions {
            mode: common.engine_mode(self.config.default_engine)?,
            allow_fallback: common.allow_fallback.unwrap_or(self.config.allow_fallback),
            navigation_timeout: Duration::from_millis(params::TIMEOUT_MS.clamp_u64(
                common.timeout_ms,
                self.config.navigation_timeout.as_millis() as u64,
            )),
            action_timeout: Duration::from_millis(params::TIMEOUT_MS.clamp_u64(
                common.timeout_ms,
                self.config.action_timeout.as_millis() as u64,
            )),
            limits: SnapshotLimits {
                max_chars: params::MAX_CHARS.clamp_usize(common.max_chars, limits.max_chars),
                max_bytes: params::MAX_BYTES.clamp_usize(common.max_bytes, limits.max_bytes),
                max_links: params::MAX_LINKS.clamp_usize(common.max_links, limits.max_links),
            },
            retries: params::RETRIES.clamp_u64(common.retries, self.config.snapshot_retries as u64) as u32,
            tab_id: common.tab_id.clone().filter(|id| !id.trim().is_empty()),
        })
    }

    /// Which engine currently backs `tab`.
    pub(crate) fn backing(&self, tab: Option<&str>) -> TabBacking {
        match tab {
            None => TabBacking::None,
            Some(id) if self.live.has_page(id) => TabBacking::Live,
            Some(_) => TabBacking::Fetch,
        }
    }

    pub(crate) fn decide(&self, call: &CallOptions, tab: Option<&str>) -> Result<EngineDecision, BrowserError> {
        resolve_engine(
            call.mode,
            self.backing(tab),
            self.live.is_available(),
            call.allow_fallback,
        )
    }

    /// Resolve the target tab and the engine for an action that needs a page.
    pub(crate) fn target(&self, call: &CallOptions) -> Result<(String, EngineDecision), BrowserError> {
        let tab_id = self.state.lock().resolve_id(call.tab_id.as_deref())?;
        let decision = self.decide(call, Some(&tab_id))?;
        Ok((tab_id, decision))
    }

    /// Same as [`target`](Self::target) but fails fast unless live.
    pub(crate) fn live_target(&self, action: &str, call: &CallOptions) -> Result<(String, EngineDecision), BrowserError> {
        let (tab_id, decision) = self.target(call)?;
        if decision.engine != Engine::Live {
            return Err(BrowserError::requires_live(action, decision.engine));
        }
        Ok((tab_id, decision))
    }

    pub(crate) fn current_snapshot(&self, tab_id: &str) -> Option<Arc<Snapshot>> {
        self.state
            .lock()
            .get(tab_id)
            .ok()
            .and_then(|t| t.last_snapshot.clone())
    }

    /// Turn popups that opened outside of a click into background tabs.
    async fn adopt_popups(&self) {
        for popup in self.live.drain_popups() {
            let raw = popup.page.url().await.unwrap_or_default();
            let url = Url::parse(&raw).unwrap_or_else(|_| blank_url());
            let tab_id = self.state.lock().create_background_tab(&url);
            debug!("Adopted popup of tab {} as {}", popup.opener_tab, tab_id);
            self.live.attach(&tab_id, popup.page);
        }
    }

    /// Run one parsed request.
    pub async fn run(&self, request: ActionRequest) -> Result<Value, BrowserError> {
        self.adopt_popups().await;
        let call = self.call_options(&request.common)?;
        let name = request.action.name();
        debug!("browser action {} (tab: {:?})", name, call.tab_id);

        let outcome = match request.action {
            BrowserAction::Open { url, background } => self.open(&call, &url, background).await?,
            BrowserAction::Navigate { url } => self.navigate(&call, &url).await?,
            BrowserAction::Reload => self.reload(&call).await?,
            BrowserAction::Back => self.history(&call, false).await?,
            BrowserAction::Forward => self.history(&call, true).await?,
            BrowserAction::Snapshot => self.snapshot(&call).await?,
            BrowserAction::Click {
                selector,
                reference,
                index,
                text,
                url,
                focus_popup,
            } => {
                let target = interaction::ClickTarget {
                    selector,
                    reference,
                    index: index.map(|i| params::LINK_INDEX.clamp_usize(Some(i), 1)),
                    text,
                    url,
                };
                self.click(&call, target, focus_popup.unwrap_or(true)).await?
            }
            BrowserAction::Fill {
                selector,
                reference,
                form_index,
                field,
                value,
            } => {
                let form_index = form_index.map(|i| i.max(1.0).round() as usize);
                self.fill(&call, selector, reference, form_index, field, value).await?
            }
            BrowserAction::Submit {
                selector,
                reference,
                form_index,
            } => {
                let form_index = form_index.map(|i| i.max(1.0).round() as usize);
                self.submit(&call, selector, reference, form_index).await?
            }
            BrowserAction::Hover { selector, reference } => self.hover(&call, selector, reference).await?,
            BrowserAction::Press { key, selector, reference } => {
                self.press(&call, &key, selector, reference).await?
            }
            BrowserAction::Select {
                selector,
                reference,
                values,
            } => self.select(&call, selector, reference, values).await?,
            BrowserAction::Drag {
                from_selector,
                from_ref,
                to_selector,
                to_ref,
            } => self.drag(&call, from_selector, from_ref, to_selector, to_ref).await?,
            BrowserAction::Evaluate { expression } => self.evaluate(&call, &expression).await?,
            BrowserAction::Upload {
                selector,
                reference,
                paths,
            } => self.upload(&call, selector, reference, paths).await?,
            BrowserAction::Scroll {
                selector,
                reference,
                delta_x,
                delta_y,
            } => {
                let dx = params::SCROLL_DELTA.clamp(delta_x, 0.0);
                let dy = params::SCROLL_DELTA.clamp(delta_y, params::DEFAULT_SCROLL_Y);
                self.scroll(&call, selector, reference, dx, dy).await?
            }
            BrowserAction::Resize { width, height } => self.resize(&call, width, height).await?,
            BrowserAction::Wait {
                ms,
                text,
                selector,
                url_contains,
            } => {
                let wait = interaction::WaitFor {
                    delay: Duration::from_millis(params::WAIT_MS.clamp_u64(ms, 0)),
                    text,
                    selector,
                    url_contains,
                };
                self.wait(&call, wait).await?
            }
            BrowserAction::Screenshot {
                full_page,
                width,
                height,
            } => self.screenshot(&call, full_page, width, height).await?,
            BrowserAction::Pdf => self.pdf(&call).await?,
            BrowserAction::Console { limit, level, clear } => {
                let limit = params::LIMIT.clamp_usize(limit, params::DEFAULT_LIMIT);
                self.console(&call, limit, level, clear).await?
            }
            BrowserAction::Dialog {
                accept,
                prompt_text,
                once,
                limit,
            } => {
                let limit = params::LIMIT.clamp_usize(limit, params::DEFAULT_LIMIT);
                self.dialog(&call, accept, prompt_text, once, limit).await?
            }
            BrowserAction::Login { service } => self.login(&call, service).await?,
            BrowserAction::Mfa { code } => self.mfa(&call, &code).await?,
            BrowserAction::Tabs => self.tabs(),
            BrowserAction::Focus => self.focus(&call)?,
            BrowserAction::Close => self.close(&call).await?,
            BrowserAction::Reset => self.reset().await,
            BrowserAction::OpenExternal { url } => self.open_external(&url)?,
        };

        let act = request.via_act.then_some(name);
        Ok(self.envelope(name, act, outcome))
    }

    fn envelope(&self, action: &str, act: Option<&str>, outcome: Outcome) -> Value {
        let state = self.state.lock();
        let active = state.active_id().map(str::to_string);
        let tab = outcome
            .tab_id
            .as_deref()
            .and_then(|id| state.get(id).ok())
            .map(|t| t.summary(active.as_deref() == Some(t.id.as_str())));
        drop(state);

        let mut body = Map::new();
        body.insert("ok".to_string(), Value::Bool(true));
        body.insert("action".to_string(), json!(act.map(|_| "act").unwrap_or(action)));
        if let Some(kind) = act {
            body.insert("kind".to_string(), json!(kind));
        }
        body.insert("engine".to_string(), json!(outcome.engine));
        body.insert("activeTabId".to_string(), json!(active));
        body.insert("tab".to_string(), json!(tab));
        body.insert("snapshot".to_string(), json!(outcome.snapshot.as_deref()));
        if let Some(from) = outcome.fallback_from {
            body.insert("fallbackFrom".to_string(), json!(from));
            body.insert("fallbackReason".to_string(), json!(outcome.fallback_reason));
        }
        for (key, value) in outcome.extra {
            body.insert(key, value);
        }
        Value::Object(body)
    }
}

pub(crate) fn blank_url() -> Url {
    Url::parse("about:blank").unwrap_or_else(|_| unreachable!("about:blank is a valid URL"))
}

fn summary_line(envelope: &Value) -> String {
    let action = envelope["kind"]
        .as_str()
        .or_else(|| envelope["action"].as_str())
        .unwrap_or("browser");
    match envelope["snapshot"]["url"].as_str() {
        Some(url) => format!(
            "{} ok: {} ({})",
            action,
            url,
            envelope["snapshot"]["title"].as_str().unwrap_or("")
        ),
        None => format!("{} ok", action),
    }
}

#[async_trait]
impl Tool for BrowserTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, params: Value, ctx: ToolContext) -> Result<ToolResult, ToolError> {
        if ctx.is_aborted() {
            return Err(ToolError::Cancelled);
        }
        let request = ActionRequest::parse(&params)?;
        let action = request.action.name();
        match self.run(request).await {
            Ok(envelope) => {
                let summary = summary_line(&envelope);
                Ok(ToolResult::success_json(summary, envelope)
                    .with_metadata("callId", json!(ctx.correlation_id)))
            }
            Err(e) => {
                warn!("browser action {} failed: {}", action, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
