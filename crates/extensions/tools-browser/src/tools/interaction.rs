//! Element actions: click, fill, submit, hover, press, select, drag,
//! upload, scroll, evaluate and wait.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{BrowserTool, CallOptions, Outcome};
use crate::driver::LivePage;
use crate::engine::Engine;
use crate::error::BrowserError;
use crate::fetch::{encode_form, PageRequest};
use crate::html::{FormMethod, Link};
use crate::snapshot::{ElementRef, RefKind, Snapshot};
use crate::tabs::validate_url;

const MARK_ATTR: &str = "data-webhands-ref";
const POLL: Duration = Duration::from_millis(100);
const TEXT_POLL: Duration = Duration::from_millis(250);
const FETCH_POLL: Duration = Duration::from_millis(500);

/// How a click names its element.
#[derive(Debug, Default)]
pub(crate) struct ClickTarget {
    pub selector: Option<String>,
    pub reference: Option<String>,
    /// 1-based position among the snapshot's links.
    pub index: Option<usize>,
    pub text: Option<String>,
    pub url: Option<String>,
}

impl ClickTarget {
    fn describe(&self) -> String {
        if let Some(index) = self.index {
            format!("index {}", index)
        } else if let Some(text) = &self.text {
            format!("text '{}'", text)
        } else if let Some(url) = &self.url {
            format!("url containing '{}'", url)
        } else {
            "nothing".to_string()
        }
    }
}

/// Conditions a `wait` blocks on, in order.
#[derive(Debug, Default)]
pub(crate) struct WaitFor {
    pub delay: Duration,
    pub text: Option<String>,
    pub selector: Option<String>,
    pub url_contains: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// JSON string literal, valid as a JS string literal.
pub(crate) fn js_str(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn form_expr(index: usize) -> String {
    format!("document.forms[{}]", index.saturating_sub(1))
}

fn field_expr(index: usize, name: &str) -> String {
    format!(
        "(f => f ? (e => (e && !e.tagName && e.length) ? e[0] : e)(f.elements.namedItem({})) : null)({})",
        js_str(name),
        form_expr(index)
    )
}

fn submit_expr(index: usize) -> String {
    format!(
        "(f => f ? f.querySelector('button[type=submit],input[type=submit],input[type=image],button:not([type])') : null)({})",
        form_expr(index)
    )
}

fn link_expr(url: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll('a[href]')).find(a => a.href === {})",
        js_str(url)
    )
}

fn legacy_link_expr(target: &ClickTarget) -> Option<String> {
    let links = "Array.from(document.querySelectorAll('a[href]'))";
    if let Some(index) = target.index {
        Some(format!("{}[{}]", links, index.saturating_sub(1)))
    } else if let Some(text) = &target.text {
        Some(format!(
            "{}.find(a => (a.innerText || a.textContent || '').toLowerCase().includes({}))",
            links,
            js_str(&text.to_lowercase())
        ))
    } else {
        target
            .url
            .as_ref()
            .map(|url| format!("{}.find(a => a.href.includes({}))", links, js_str(url)))
    }
}

fn tag_script(expr: &str, marker: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; el.setAttribute('{}', {}); return true; }})()",
        expr,
        MARK_ATTR,
        js_str(marker)
    )
}

fn fresh_marker() -> String {
    format!("w{}", Uuid::new_v4().simple())
}

/// Mark the element `expr` evaluates to and return a selector for it.
pub(crate) async fn tag_element(
    page: &Arc<dyn LivePage>,
    expr: &str,
    marker: &str,
    what: &str,
) -> Result<String, BrowserError> {
    let found = page.evaluate(&tag_script(expr, marker)).await?;
    if found.as_bool() != Some(true) {
        return Err(BrowserError::ElementNotFound(what.to_string()));
    }
    Ok(format!("[{}=\"{}\"]", MARK_ATTR, marker))
}

/// Submit the form `locator` evaluates to (or the form containing it).
/// `requestSubmit` runs validation and handlers; frameworks that swallow it
/// get the native `submit()`.
fn submit_script(locator: &str) -> String {
    format!(
        r#"(() => {{
  const el = {};
  const form = el && (el.tagName === 'FORM' ? el : (el.form || el.closest('form')));
  if (!form) return 'missing';
  if (typeof form.requestSubmit === 'function') {{
    try {{ form.requestSubmit(); return 'requestSubmit'; }} catch (e) {{}}
  }}
  HTMLFormElement.prototype.submit.call(form);
  return 'submit';
}})()"#,
        locator
    )
}

async fn url_changed(page: &Arc<dyn LivePage>, before: &str, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    loop {
        if let Ok(now) = page.url().await {
            if now != before {
                return true;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL).await;
    }
}

fn match_link<'a>(links: &'a [Link], target: &ClickTarget) -> Option<&'a Link> {
    if let Some(index) = target.index {
        return index.checked_sub(1).and_then(|i| links.get(i));
    }
    if let Some(text) = &target.text {
        let needle = text.to_lowercase();
        return links.iter().find(|l| l.text.to_lowercase().contains(&needle));
    }
    let needle = target.url.as_deref()?;
    links.iter().find(|l| l.url.contains(needle))
}

enum Settled {
    Popup(Arc<dyn LivePage>),
    Navigated,
    Idle,
}

impl BrowserTool {
    pub(crate) fn resolve_ref(&self, tab_id: &str, reference: &str) -> Result<ElementRef, BrowserError> {
        let state = self.state.lock();
        let tab = state.get(tab_id)?;
        tab.last_snapshot
            .as_ref()
            .and_then(|s| s.find_ref(reference))
            .cloned()
            .ok_or_else(|| BrowserError::RefNotFound {
                reference: reference.to_string(),
                tab: tab_id.to_string(),
            })
    }

    /// CSS selector of a ref on the live page.
    async fn ref_selector(&self, tab_id: &str, page: &Arc<dyn LivePage>, reference: &str) -> Result<String, BrowserError> {
        let r = self.resolve_ref(tab_id, reference)?;
        if let Some(selector) = &r.selector {
            return Ok(selector.clone());
        }
        let expr = match (r.kind, r.form_index) {
            (RefKind::Link, _) => r.url.as_deref().map(link_expr),
            (RefKind::Form, Some(i)) => Some(form_expr(i)),
            (RefKind::Field, Some(i)) => r.field.as_deref().map(|f| field_expr(i, f)),
            (RefKind::Submit, Some(i)) => Some(submit_expr(i)),
            _ => None,
        }
        .ok_or_else(|| BrowserError::ElementNotFound(format!("ref {} has no locator", r.id)))?;
        tag_element(page, &expr, &r.id, &format!("ref {}", r.id)).await
    }

    /// Selector from an explicit selector or a ref, selector first.
    async fn live_selector(
        &self,
        tab_id: &str,
        page: &Arc<dyn LivePage>,
        selector: Option<String>,
        reference: Option<String>,
    ) -> Result<Option<String>, BrowserError> {
        if let Some(selector) = non_empty(selector) {
            return Ok(Some(selector));
        }
        match non_empty(reference) {
            Some(reference) => self.ref_selector(tab_id, page, &reference).await.map(Some),
            None => Ok(None),
        }
    }

    async fn required_selector(
        &self,
        tab_id: &str,
        page: &Arc<dyn LivePage>,
        selector: Option<String>,
        reference: Option<String>,
        names: &str,
    ) -> Result<String, BrowserError> {
        self.live_selector(tab_id, page, selector, reference)
            .await?
            .ok_or_else(|| BrowserError::MissingParameter(names.to_string()))
    }

    /// Give an input-driven navigation a moment to start, then let it load.
    async fn settle(&self, page: &Arc<dyn LivePage>, before: &str, call: &CallOptions) {
        if url_changed(page, before, self.config.popup_wait).await {
            if let Err(e) = page.wait_for_load(call.navigation_timeout).await {
                debug!("Waiting for load after input: {}", e);
            }
        }
    }

    async fn recapture(&self, tab_id: &str, page: &Arc<dyn LivePage>, call: &CallOptions) -> Result<Arc<Snapshot>, BrowserError> {
        self.capture_live(tab_id, page, None, &call.limits, true).await
    }

    // ------------------------------------------------------------------
    // Click
    // ------------------------------------------------------------------

    pub(super) async fn click(&self, call: &CallOptions, target: ClickTarget, focus_popup: bool) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.target(call)?;
        let outcome = match decision.engine {
            Engine::Fetch => self.fetch_click(call, &tab_id, target).await?,
            Engine::Live => self.live_click(call, &tab_id, target, focus_popup).await?,
        };
        Ok(outcome.with_decision(&decision))
    }

    async fn fetch_click(&self, call: &CallOptions, tab_id: &str, target: ClickTarget) -> Result<Outcome, BrowserError> {
        if non_empty(target.selector.clone()).is_some() {
            return Err(BrowserError::requires_live("click with a selector", Engine::Fetch));
        }
        let snapshot = self.ensure_snapshot(tab_id, call).await?;

        if let Some(reference) = non_empty(target.reference.clone()) {
            let r = self.resolve_ref(tab_id, &reference)?;
            return match (r.kind, r.form_index) {
                (RefKind::Link, _) => {
                    let url = r
                        .url
                        .ok_or_else(|| BrowserError::ElementNotFound(format!("ref {} has no target", r.id)))?;
                    self.follow_link(call, tab_id, &url, &snapshot.url).await
                }
                (RefKind::Submit | RefKind::Form, Some(form_index)) => {
                    self.submit_fetch_form(call, tab_id, form_index).await
                }
                _ => Err(BrowserError::requires_live(
                    &format!("click on {} ref {}", r.role, r.id),
                    Engine::Fetch,
                )),
            };
        }

        if target.index.is_none() && target.text.is_none() && target.url.is_none() {
            return Err(BrowserError::MissingParameter(
                "selector, ref, index, text or url".to_string(),
            ));
        }
        let link = match_link(&snapshot.links, &target)
            .cloned()
            .ok_or_else(|| BrowserError::LinkNotFound(target.describe()))?;
        self.follow_link(call, tab_id, &link.url, &snapshot.url).await
    }

    async fn follow_link(&self, call: &CallOptions, tab_id: &str, raw: &str, referer: &str) -> Result<Outcome, BrowserError> {
        let url = validate_url(raw)?;
        self.state.lock().navigate(tab_id, &url)?;
        let request = PageRequest::get(url).with_referer(referer);
        let snapshot = self.fetch_load(tab_id, request, call).await?;
        Ok(Outcome::on(Engine::Fetch, tab_id).with_snapshot(Some(snapshot)))
    }

    async fn live_click(
        &self,
        call: &CallOptions,
        tab_id: &str,
        target: ClickTarget,
        focus_popup: bool,
    ) -> Result<Outcome, BrowserError> {
        let page = self.ensure_live_page(tab_id, call).await?;
        let selector = match self
            .live_selector(tab_id, &page, target.selector.clone(), target.reference.clone())
            .await?
        {
            Some(selector) => selector,
            None => {
                let expr = legacy_link_expr(&target).ok_or_else(|| {
                    BrowserError::MissingParameter("selector, ref, index, text or url".to_string())
                })?;
                tag_element(&page, &expr, &fresh_marker(), &target.describe())
                    .await
                    .map_err(|_| BrowserError::LinkNotFound(target.describe()))?
            }
        };

        let before = page.url().await.unwrap_or_default();
        page.click(&selector, call.action_timeout).await?;

        let wait = self.config.popup_wait;
        let settled = tokio::select! {
            Some(popup) = self.live.wait_for_popup(tab_id, wait) => Settled::Popup(popup),
            true = url_changed(&page, &before, wait) => Settled::Navigated,
            else => Settled::Idle,
        };

        match settled {
            Settled::Popup(popup) => self.adopt_click_popup(call, tab_id, &page, popup, focus_popup).await,
            settled => {
                if matches!(settled, Settled::Navigated) {
                    if let Err(e) = page.wait_for_load(call.navigation_timeout).await {
                        debug!("Waiting for load after click: {}", e);
                    }
                }
                let snapshot = self.recapture(tab_id, &page, call).await?;
                Ok(Outcome::on(Engine::Live, tab_id).with_snapshot(Some(snapshot)))
            }
        }
    }

    async fn adopt_click_popup(
        &self,
        call: &CallOptions,
        opener: &str,
        opener_page: &Arc<dyn LivePage>,
        popup: Arc<dyn LivePage>,
        focus: bool,
    ) -> Result<Outcome, BrowserError> {
        if let Err(e) = popup.wait_for_load(call.navigation_timeout).await {
            debug!("Popup did not finish loading: {}", e);
        }
        let raw = popup.url().await.unwrap_or_default();
        let url = Url::parse(&raw).unwrap_or_else(|_| super::blank_url());
        let popup_tab = self.state.lock().create_background_tab(&url);
        self.live.attach(&popup_tab, popup.clone());
        if focus {
            self.state.lock().focus(&popup_tab)?;
        }
        debug!("Click on tab {} opened popup tab {}", opener, popup_tab);

        let popup_snapshot = self.capture_live(&popup_tab, &popup, None, &call.limits, false).await?;
        let info = json!({
            "tabId": popup_tab,
            "url": popup_snapshot.url,
            "focused": focus,
        });
        if focus {
            return Ok(Outcome::on(Engine::Live, &popup_tab)
                .with_snapshot(Some(popup_snapshot))
                .with("popup", info)
                .with("openerTabId", opener));
        }
        let snapshot = self.recapture(opener, opener_page, call).await?;
        Ok(Outcome::on(Engine::Live, opener)
            .with_snapshot(Some(snapshot))
            .with("popup", info))
    }

    // ------------------------------------------------------------------
    // Forms
    // ------------------------------------------------------------------

    pub(super) async fn fill(
        &self,
        call: &CallOptions,
        selector: Option<String>,
        reference: Option<String>,
        form_index: Option<usize>,
        field: Option<String>,
        value: String,
    ) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.target(call)?;
        let selector = non_empty(selector);
        let reference = non_empty(reference);

        if decision.engine == Engine::Fetch {
            if selector.is_some() {
                return Err(BrowserError::requires_live("fill with a selector", Engine::Fetch));
            }
            self.ensure_snapshot(&tab_id, call).await?;
            let (form_index, field) = match reference {
                Some(reference) => {
                    let r = self.resolve_ref(&tab_id, &reference)?;
                    match (r.kind, r.form_index, r.field) {
                        (RefKind::Field, Some(i), Some(f)) => (i, f),
                        _ => {
                            return Err(BrowserError::InvalidParameter(format!(
                                "ref {} is not a form field",
                                r.id
                            )));
                        }
                    }
                }
                None => (
                    form_index.unwrap_or(1),
                    non_empty(field).ok_or_else(|| BrowserError::MissingParameter("field".to_string()))?,
                ),
            };

            let snapshot = {
                let mut state = self.state.lock();
                let tab = state.get_mut(&tab_id)?;
                if tab.form(form_index)?.field(&field).is_none() {
                    return Err(BrowserError::FieldNotFound { form: form_index, field });
                }
                tab.form_values
                    .entry(form_index)
                    .or_default()
                    .insert(field.clone(), value);
                tab.last_snapshot.clone()
            };
            return Ok(Outcome::on(Engine::Fetch, &tab_id)
                .with_snapshot(snapshot)
                .with_decision(&decision)
                .with("formIndex", form_index)
                .with("field", field));
        }

        let page = self.ensure_live_page(&tab_id, call).await?;
        let (target, recorded) = match (selector, reference) {
            (Some(selector), _) => (selector, None),
            (None, Some(reference)) => {
                let r = self.resolve_ref(&tab_id, &reference)?;
                let recorded = r.form_index.zip(r.field.clone());
                (self.ref_selector(&tab_id, &page, &reference).await?, recorded)
            }
            (None, None) => {
                let index = form_index.unwrap_or(1);
                let field = non_empty(field).ok_or_else(|| BrowserError::MissingParameter("field".to_string()))?;
                let selector = tag_element(
                    &page,
                    &field_expr(index, &field),
                    &fresh_marker(),
                    &format!("field '{}' in form {}", field, index),
                )
                .await
                .map_err(|_| BrowserError::FieldNotFound {
                    form: index,
                    field: field.clone(),
                })?;
                (selector, Some((index, field)))
            }
        };

        page.fill(&target, &value, call.action_timeout).await?;
        if let Some((index, name)) = &recorded {
            let mut state = self.state.lock();
            state
                .get_mut(&tab_id)?
                .form_values
                .entry(*index)
                .or_default()
                .insert(name.clone(), value);
        }
        let snapshot = self.recapture(&tab_id, &page, call).await?;
        let mut outcome = Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(Some(snapshot))
            .with_decision(&decision);
        if let Some((index, name)) = recorded {
            outcome = outcome.with("formIndex", index).with("field", name);
        }
        Ok(outcome)
    }

    pub(super) async fn submit(
        &self,
        call: &CallOptions,
        selector: Option<String>,
        reference: Option<String>,
        form_index: Option<usize>,
    ) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.target(call)?;
        let selector = non_empty(selector);
        let reference = non_empty(reference);

        if decision.engine == Engine::Fetch {
            if selector.is_some() {
                return Err(BrowserError::requires_live("submit with a selector", Engine::Fetch));
            }
            self.ensure_snapshot(&tab_id, call).await?;
            let index = match reference {
                Some(reference) => {
                    let r = self.resolve_ref(&tab_id, &reference)?;
                    match (r.kind, r.form_index) {
                        (RefKind::Form | RefKind::Field | RefKind::Submit, Some(i)) => i,
                        _ => {
                            return Err(BrowserError::InvalidParameter(format!(
                                "ref {} does not belong to a form",
                                r.id
                            )));
                        }
                    }
                }
                None => form_index.unwrap_or(1),
            };
            let outcome = self.submit_fetch_form(call, &tab_id, index).await?;
            return Ok(outcome.with_decision(&decision));
        }

        let page = self.ensure_live_page(&tab_id, call).await?;
        let locator = match (selector, reference) {
            (Some(selector), _) => format!("document.querySelector({})", js_str(&selector)),
            (None, Some(reference)) => {
                let selector = self.ref_selector(&tab_id, &page, &reference).await?;
                format!("document.querySelector({})", js_str(&selector))
            }
            (None, None) => form_expr(form_index.unwrap_or(1)),
        };
        let before = page.url().await.unwrap_or_default();
        let via = page.evaluate(&submit_script(&locator)).await?;
        let via = via.as_str().unwrap_or("submit").to_string();
        if via == "missing" {
            return Err(BrowserError::FormNotFound(form_index.unwrap_or(1)));
        }
        self.settle(&page, &before, call).await;
        let snapshot = self.recapture(&tab_id, &page, call).await?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(Some(snapshot))
            .with_decision(&decision)
            .with("via", via))
    }

    /// Submit form `index` of the tab's current document with its overrides.
    pub(crate) async fn submit_fetch_form(&self, call: &CallOptions, tab_id: &str, index: usize) -> Result<Outcome, BrowserError> {
        let (method, action, pairs, referer) = {
            let state = self.state.lock();
            let tab = state.get(tab_id)?;
            let form = tab.form(index)?;
            let overrides = tab.form_values.get(&index).cloned().unwrap_or_default();
            (form.method, form.action.clone(), form.encoded_pairs(&overrides), tab.url.clone())
        };
        let action = validate_url(&action)?;
        debug!("Submitting form {} of tab {} ({:?} {})", index, tab_id, method, action);

        let request = match method {
            FormMethod::Get => {
                let mut target = action;
                let query = encode_form(&pairs);
                target.set_query((!query.is_empty()).then_some(query.as_str()));
                self.state.lock().navigate(tab_id, &target)?;
                PageRequest::get(target)
            }
            FormMethod::Post => {
                self.state.lock().navigate(tab_id, &action)?;
                PageRequest::post_form(action, pairs)
            }
        };
        let snapshot = self.fetch_load(tab_id, request.with_referer(referer), call).await?;
        Ok(Outcome::on(Engine::Fetch, tab_id)
            .with_snapshot(Some(snapshot))
            .with("formIndex", index))
    }

    // ------------------------------------------------------------------
    // Live-only element actions
    // ------------------------------------------------------------------

    pub(super) async fn hover(&self, call: &CallOptions, selector: Option<String>, reference: Option<String>) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.live_target("hover", call)?;
        let page = self.ensure_live_page(&tab_id, call).await?;
        let target = self
            .required_selector(&tab_id, &page, selector, reference, "selector or ref")
            .await?;
        page.hover(&target, call.action_timeout).await?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(self.current_snapshot(&tab_id))
            .with_decision(&decision))
    }

    pub(super) async fn press(
        &self,
        call: &CallOptions,
        key: &str,
        selector: Option<String>,
        reference: Option<String>,
    ) -> Result<Outcome, BrowserError> {
        if key.trim().is_empty() {
            return Err(BrowserError::MissingParameter("key".to_string()));
        }
        let (tab_id, decision) = self.live_target("press", call)?;
        let page = self.ensure_live_page(&tab_id, call).await?;
        let target = self.live_selector(&tab_id, &page, selector, reference).await?;
        let before = page.url().await.unwrap_or_default();
        page.press(key, target.as_deref()).await?;
        self.settle(&page, &before, call).await;
        let snapshot = self.recapture(&tab_id, &page, call).await?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(Some(snapshot))
            .with_decision(&decision)
            .with("key", key))
    }

    pub(super) async fn select(
        &self,
        call: &CallOptions,
        selector: Option<String>,
        reference: Option<String>,
        values: Vec<String>,
    ) -> Result<Outcome, BrowserError> {
        if values.is_empty() {
            return Err(BrowserError::MissingParameter("values".to_string()));
        }
        let (tab_id, decision) = self.live_target("select", call)?;
        let page = self.ensure_live_page(&tab_id, call).await?;
        let target = self
            .required_selector(&tab_id, &page, selector, reference, "selector or ref")
            .await?;
        let selected = page.select_options(&target, &values).await?;
        let snapshot = self.recapture(&tab_id, &page, call).await?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(Some(snapshot))
            .with_decision(&decision)
            .with("selected", json!(selected)))
    }

    pub(super) async fn drag(
        &self,
        call: &CallOptions,
        from_selector: Option<String>,
        from_ref: Option<String>,
        to_selector: Option<String>,
        to_ref: Option<String>,
    ) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.live_target("drag", call)?;
        let page = self.ensure_live_page(&tab_id, call).await?;
        let from = self
            .required_selector(&tab_id, &page, from_selector, from_ref, "fromSelector or fromRef")
            .await?;
        let to = self
            .required_selector(&tab_id, &page, to_selector, to_ref, "toSelector or toRef")
            .await?;
        page.drag(&from, &to).await?;
        let snapshot = self.recapture(&tab_id, &page, call).await?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(Some(snapshot))
            .with_decision(&decision))
    }

    pub(super) async fn evaluate(&self, call: &CallOptions, expression: &str) -> Result<Outcome, BrowserError> {
        if expression.trim().is_empty() {
            return Err(BrowserError::MissingParameter("expression".to_string()));
        }
        let (tab_id, decision) = self.live_target("evaluate", call)?;
        let page = self.ensure_live_page(&tab_id, call).await?;
        let result = page.evaluate(expression).await?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(self.current_snapshot(&tab_id))
            .with_decision(&decision)
            .with("result", result))
    }

    pub(super) async fn upload(
        &self,
        call: &CallOptions,
        selector: Option<String>,
        reference: Option<String>,
        paths: Vec<String>,
    ) -> Result<Outcome, BrowserError> {
        if paths.is_empty() {
            return Err(BrowserError::MissingParameter("paths".to_string()));
        }
        let mut files = Vec::with_capacity(paths.len());
        for raw in &paths {
            let path = PathBuf::from(shellexpand::tilde(raw).into_owned());
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(BrowserError::InvalidParameter(format!("file not found: {}", raw)));
            }
            files.push(path);
        }

        let (tab_id, decision) = self.live_target("upload", call)?;
        let page = self.ensure_live_page(&tab_id, call).await?;
        let target = self
            .live_selector(&tab_id, &page, selector, reference)
            .await?
            .unwrap_or_else(|| "input[type=file]".to_string());
        page.set_input_files(&target, &files).await?;
        let snapshot = self.recapture(&tab_id, &page, call).await?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(Some(snapshot))
            .with_decision(&decision)
            .with("files", files.len()))
    }

    pub(super) async fn scroll(
        &self,
        call: &CallOptions,
        selector: Option<String>,
        reference: Option<String>,
        delta_x: f64,
        delta_y: f64,
    ) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.live_target("scroll", call)?;
        let page = self.ensure_live_page(&tab_id, call).await?;
        let target = self.live_selector(&tab_id, &page, selector, reference).await?;
        page.scroll(target.as_deref(), delta_x, delta_y).await?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(self.current_snapshot(&tab_id))
            .with_decision(&decision)
            .with("scrolled", json!({ "deltaX": delta_x, "deltaY": delta_y })))
    }

    // ------------------------------------------------------------------
    // Wait
    // ------------------------------------------------------------------

    pub(super) async fn wait(&self, call: &CallOptions, wait: WaitFor) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.target(call)?;
        let text = non_empty(wait.text);
        let selector = non_empty(wait.selector);
        let url_contains = non_empty(wait.url_contains);

        if decision.engine == Engine::Fetch {
            if selector.is_some() {
                return Err(BrowserError::requires_live("wait for a selector", Engine::Fetch));
            }
            tokio::time::sleep(wait.delay).await;
            let deadline = Instant::now() + call.action_timeout;
            let mut snapshot = self.ensure_snapshot(&tab_id, call).await?;
            if text.is_some() || url_contains.is_some() {
                loop {
                    let text_ok = text.as_deref().is_none_or(|t| snapshot.text.contains(t));
                    let url_ok = url_contains.as_deref().is_none_or(|u| snapshot.url.contains(u));
                    if text_ok && url_ok {
                        break;
                    }
                    if Instant::now() >= deadline {
                        return Err(BrowserError::Timeout(format!(
                            "condition not met on tab {} within {}ms",
                            tab_id,
                            call.action_timeout.as_millis()
                        )));
                    }
                    tokio::time::sleep(FETCH_POLL).await;
                    snapshot = self.refetch(&tab_id, call).await?;
                }
            }
            return Ok(Outcome::on(Engine::Fetch, &tab_id)
                .with_snapshot(Some(snapshot))
                .with_decision(&decision));
        }

        let page = self.ensure_live_page(&tab_id, call).await?;
        tokio::time::sleep(wait.delay).await;
        if let Some(selector) = &selector {
            page.wait_for_selector(selector, call.action_timeout).await?;
        }
        let deadline = Instant::now() + call.action_timeout;
        if let Some(text) = &text {
            let probe = format!(
                "!!(document.body && document.body.innerText.includes({}))",
                js_str(text)
            );
            while page.evaluate(&probe).await?.as_bool() != Some(true) {
                if Instant::now() >= deadline {
                    return Err(BrowserError::Timeout(format!("text '{}' did not appear", text)));
                }
                tokio::time::sleep(TEXT_POLL).await;
            }
        }
        if let Some(fragment) = &url_contains {
            while !page.url().await?.contains(fragment.as_str()) {
                if Instant::now() >= deadline {
                    return Err(BrowserError::Timeout(format!("url never contained '{}'", fragment)));
                }
                tokio::time::sleep(TEXT_POLL).await;
            }
        }
        let snapshot = self.recapture(&tab_id, &page, call).await?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(Some(snapshot))
            .with_decision(&decision))
    }
}
