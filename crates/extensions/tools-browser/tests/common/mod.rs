//! Scripted in-memory browser shared by the integration tests.
//!
//! A [`World`] describes documents by URL. Pages opened from it navigate
//! between those documents, answer the element probe with the rows of the
//! current document and record every input command in a shared log.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use webhands_protocols::{Tool, ToolContext};
use webhands_tools_browser::snapshot::PROBE_SCRIPT;
use webhands_tools_browser::{
    BrowserError, BrowserTool, BrowserToolConfig, Cookie, HttpFetcher, LaunchOptions, LiveBrowser,
    LiveContext, LiveDriver, LivePage, PageEvent, ReqwestFetcher,
};

/// One scripted document.
#[derive(Clone, Default)]
pub struct Doc {
    pub title: String,
    pub html: String,
    /// Rows returned for the element probe.
    pub rows: Vec<Value>,
    /// Selectors that count as rendered for presence checks.
    pub present: Vec<String>,
}

impl Doc {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            html: format!("<html><head><title>{}</title></head><body>{}</body></html>", title, body),
            ..Self::default()
        }
    }

    pub fn row(mut self, row: Value) -> Self {
        self.rows.push(row);
        self
    }

    pub fn present(mut self, selector: &str) -> Self {
        self.present.push(selector.to_string());
        self
    }
}

/// What clicking a selector does.
#[derive(Clone)]
pub enum Effect {
    Navigate(String),
    Popup(String),
}

/// Shared script and log for every page of one driver.
#[derive(Default)]
pub struct World {
    docs: Mutex<HashMap<String, Doc>>,
    effects: Mutex<HashMap<String, Effect>>,
    failing: Mutex<HashSet<String>>,
    results: Mutex<HashMap<String, Value>>,
    otp_boxes: AtomicUsize,
    log: Mutex<Vec<String>>,
    pages: Mutex<Vec<Arc<ScriptedPage>>>,
    launches: AtomicUsize,
    next_page: AtomicUsize,
    unavailable: AtomicBool,
}

impl World {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn doc(&self, url: &str, doc: Doc) {
        self.docs.lock().insert(url.to_string(), doc);
    }

    pub fn on_click(&self, selector: &str, effect: Effect) {
        self.effects.lock().insert(selector.to_string(), effect);
    }

    /// `goto` of `url` times out.
    pub fn fail_goto(&self, url: &str) {
        self.failing.lock().insert(url.to_string());
    }

    /// Value returned when a page evaluates exactly `expression`.
    pub fn result(&self, expression: &str, value: Value) {
        self.results.lock().insert(expression.to_string(), value);
    }

    /// The driver reports that no browser can be launched.
    pub fn set_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn otp_boxes(&self, count: usize) {
        self.otp_boxes.store(count, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn page(&self, index: usize) -> Arc<ScriptedPage> {
        self.pages.lock()[index].clone()
    }

    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    fn record(&self, entry: String) {
        self.log.lock().push(entry);
    }

    fn lookup(&self, url: &str) -> Doc {
        self.docs.lock().get(url).cloned().unwrap_or_default()
    }

    fn spawn_page(self: &Arc<Self>, url: &str) -> Arc<ScriptedPage> {
        let n = self.next_page.fetch_add(1, Ordering::SeqCst) + 1;
        let (sender, events) = mpsc::unbounded_channel();
        let page = Arc::new(ScriptedPage {
            id: format!("page-{}", n),
            world: self.clone(),
            url: Mutex::new(url.to_string()),
            closed: AtomicBool::new(false),
            sender,
            events: Mutex::new(Some(events)),
        });
        self.pages.lock().push(page.clone());
        page
    }
}

pub struct ScriptedDriver {
    world: Arc<World>,
}

impl ScriptedDriver {
    pub fn new(world: Arc<World>) -> Arc<Self> {
        Arc::new(Self { world })
    }
}

#[async_trait]
impl LiveDriver for ScriptedDriver {
    fn is_available(&self) -> bool {
        !self.world.unavailable.load(Ordering::SeqCst)
    }

    async fn launch(&self, _options: &LaunchOptions) -> Result<Arc<dyn LiveBrowser>, BrowserError> {
        self.world.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedBrowser {
            world: self.world.clone(),
        }))
    }
}

struct ScriptedBrowser {
    world: Arc<World>,
}

#[async_trait]
impl LiveBrowser for ScriptedBrowser {
    async fn new_context(&self) -> Result<Arc<dyn LiveContext>, BrowserError> {
        Ok(Arc::new(ScriptedContext {
            world: self.world.clone(),
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.world.record("browser.close".to_string());
        Ok(())
    }
}

struct ScriptedContext {
    world: Arc<World>,
}

#[async_trait]
impl LiveContext for ScriptedContext {
    async fn new_page(&self) -> Result<Arc<dyn LivePage>, BrowserError> {
        Ok(self.world.spawn_page("about:blank"))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

pub struct ScriptedPage {
    id: String,
    world: Arc<World>,
    url: Mutex<String>,
    closed: AtomicBool,
    sender: mpsc::UnboundedSender<PageEvent>,
    events: Mutex<Option<mpsc::UnboundedReceiver<PageEvent>>>,
}

impl ScriptedPage {
    pub fn emit(&self, event: PageEvent) {
        let _ = self.sender.send(event);
    }

    pub fn current_url(&self) -> String {
        self.url.lock().clone()
    }

    fn doc(&self) -> Doc {
        self.world.lookup(&self.current_url())
    }

    fn first_present(&self, expression: &str) -> Value {
        let Some(start) = expression.find("const list = ") else {
            return Value::Null;
        };
        let rest = &expression[start + "const list = ".len()..];
        let end = rest.find(";\n").unwrap_or(rest.len());
        let list: Vec<String> = serde_json::from_str(&rest[..end]).unwrap_or_default();
        let present = self.doc().present;
        list.into_iter()
            .find(|s| present.contains(s))
            .map(Value::String)
            .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl LivePage for ScriptedPage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn goto(&self, url: &str, _timeout: Duration) -> Result<Option<u16>, BrowserError> {
        self.world.record(format!("goto {}", url));
        if self.world.failing.lock().contains(url) {
            return Err(BrowserError::Timeout(format!("navigation to {}", url)));
        }
        *self.url.lock() = url.to_string();
        Ok(Some(200))
    }

    async fn reload(&self, _timeout: Duration) -> Result<Option<u16>, BrowserError> {
        self.world.record("reload".to_string());
        Ok(Some(200))
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn url(&self) -> Result<String, BrowserError> {
        Ok(self.current_url())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.doc().title)
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.doc().html)
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        if expression == PROBE_SCRIPT {
            return Ok(Value::Array(self.doc().rows));
        }
        if let Some(value) = self.world.results.lock().get(expression) {
            return Ok(value.clone());
        }
        if expression.contains("const list = ") {
            return Ok(self.first_present(expression));
        }
        if expression.contains("data-webhands-otp") {
            return Ok(json!(self.world.otp_boxes.load(Ordering::SeqCst)));
        }
        if expression.contains("data-webhands-ref") {
            return Ok(Value::Bool(true));
        }
        Ok(Value::Null)
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.world.record(format!("click {}", selector));
        let effect = self.world.effects.lock().get(selector).cloned();
        match effect {
            Some(Effect::Navigate(url)) => *self.url.lock() = url,
            Some(Effect::Popup(url)) => {
                let popup = self.world.spawn_page(&url);
                self.emit(PageEvent::Popup(popup));
            }
            None => {}
        }
        Ok(())
    }

    async fn hover(&self, selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.world.record(format!("hover {}", selector));
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.world.record(format!("fill {}={}", selector, value));
        Ok(())
    }

    async fn press(&self, key: &str, selector: Option<&str>) -> Result<(), BrowserError> {
        self.world
            .record(format!("press {} on {}", key, selector.unwrap_or("page")));
        Ok(())
    }

    async fn select_options(&self, selector: &str, values: &[String]) -> Result<Vec<String>, BrowserError> {
        self.world
            .record(format!("select {}={}", selector, values.join(",")));
        Ok(values.to_vec())
    }

    async fn drag(&self, from: &str, to: &str) -> Result<(), BrowserError> {
        self.world.record(format!("drag {} -> {}", from, to));
        Ok(())
    }

    async fn set_input_files(&self, selector: &str, paths: &[PathBuf]) -> Result<(), BrowserError> {
        self.world
            .record(format!("upload {} ({} files)", selector, paths.len()));
        Ok(())
    }

    async fn scroll(&self, selector: Option<&str>, delta_x: f64, delta_y: f64) -> Result<(), BrowserError> {
        self.world.record(format!(
            "scroll {} by {},{}",
            selector.unwrap_or("page"),
            delta_x,
            delta_y
        ));
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), BrowserError> {
        self.world.record(format!("viewport {}x{}", width, height));
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        if self.doc().present.iter().any(|s| s == selector) {
            Ok(())
        } else {
            Err(BrowserError::Timeout(format!("waiting for {}", selector)))
        }
    }

    async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>, BrowserError> {
        Ok(b"\x89PNG\r\n\x1a\nscripted".to_vec())
    }

    async fn pdf(&self) -> Result<Vec<u8>, BrowserError> {
        Ok(b"%PDF-1.4 scripted".to_vec())
    }

    async fn handle_dialog(&self, accept: bool, prompt_text: Option<&str>) -> Result<(), BrowserError> {
        self.world.record(format!(
            "dialog accept={} text={}",
            accept,
            prompt_text.unwrap_or("-")
        ));
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        Ok(vec![Cookie {
            name: "live".to_string(),
            value: "1".to_string(),
            domain: "site.test".to_string(),
            host_only: true,
            path: "/".to_string(),
            expires: None,
            secure: false,
        }])
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PageEvent>> {
        self.events.lock().take()
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Config tuned for tests: short waits, artifacts under `artifacts`.
pub fn test_config(artifacts: PathBuf) -> BrowserToolConfig {
    BrowserToolConfig {
        popup_wait: Duration::from_millis(200),
        action_timeout: Duration::from_millis(1_000),
        artifacts_dir: artifacts,
        ..BrowserToolConfig::default()
    }
}

pub fn http() -> Arc<dyn HttpFetcher> {
    Arc::new(ReqwestFetcher::new("webhands-tests").expect("http client"))
}

pub fn live_tool(world: &Arc<World>, artifacts: PathBuf) -> BrowserTool {
    BrowserTool::new(test_config(artifacts), http(), Some(ScriptedDriver::new(world.clone())))
}

/// Execute and return the envelope; panics on a tool error.
pub async fn call(tool: &BrowserTool, params: Value) -> Value {
    let result = tool
        .execute(params.clone(), ToolContext::new("test"))
        .await
        .unwrap_or_else(|e| panic!("{} failed: {}", params, e));
    result.structured_output.expect("envelope")
}

pub fn ref_named<'a>(envelope: &'a Value, name: &str) -> &'a Value {
    envelope["snapshot"]["refs"]
        .as_array()
        .and_then(|refs| refs.iter().find(|r| r["name"] == name))
        .unwrap_or_else(|| panic!("no ref named {} in {}", name, envelope["snapshot"]["refs"]))
}
