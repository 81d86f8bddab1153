//! Tab registry: open tabs, active pointer, per-tab history.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::cookies::CookieJar;
use crate::error::BrowserError;
use crate::html::Form;
use crate::snapshot::{RefCounter, Snapshot};

/// Parse `raw` and require an http(s) URL.
pub fn validate_url(raw: &str) -> Result<Url, BrowserError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BrowserError::MissingParameter("url".to_string()));
    }
    let url = Url::parse(trimmed).map_err(|e| BrowserError::InvalidUrl(format!("{}: {}", trimmed, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BrowserError::InvalidUrl(format!(
            "{}: only http and https are supported (got {})",
            trimmed, other
        ))),
    }
}

/// One logical browsing context.
#[derive(Debug, Clone)]
pub struct Tab {
    pub id: String,
    pub url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<String>,
    pub history_index: usize,
    pub last_snapshot: Option<Arc<Snapshot>>,
    /// Markup of the last fetch-engine response.
    pub last_raw_document: Option<String>,
    pub forms: Vec<Form>,
    /// Field overrides keyed by 1-based form index.
    pub form_values: HashMap<usize, BTreeMap<String, String>>,
    pub cookies: CookieJar,
    pub refs: RefCounter,
    pub last_status: Option<u16>,
}

impl Tab {
    fn new(id: String, url: &Url) -> Self {
        let now = Utc::now();
        Self {
            id,
            url: url.to_string(),
            title: String::new(),
            created_at: now,
            updated_at: now,
            history: vec![url.to_string()],
            history_index: 0,
            last_snapshot: None,
            last_raw_document: None,
            forms: Vec::new(),
            form_values: HashMap::new(),
            cookies: CookieJar::new(),
            refs: RefCounter::new(),
            last_status: None,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Drop everything derived from the current document. The cookie jar survives.
    pub fn clear_page_state(&mut self) {
        self.last_snapshot = None;
        self.last_raw_document = None;
        self.forms.clear();
        self.form_values.clear();
        self.last_status = None;
        self.title.clear();
        self.touch();
    }

    /// Capture the current document state so a failed history move can
    /// put it back. Cookies and the ref counter are not part of it.
    pub fn position(&self) -> TabPosition {
        TabPosition {
            url: self.url.clone(),
            history_index: self.history_index,
            title: self.title.clone(),
            last_snapshot: self.last_snapshot.clone(),
            last_raw_document: self.last_raw_document.clone(),
            forms: self.forms.clone(),
            form_values: self.form_values.clone(),
            last_status: self.last_status,
        }
    }

    pub fn restore_position(&mut self, saved: TabPosition) {
        self.url = saved.url;
        self.history_index = saved.history_index.min(self.history.len().saturating_sub(1));
        self.title = saved.title;
        self.last_snapshot = saved.last_snapshot;
        self.last_raw_document = saved.last_raw_document;
        self.forms = saved.forms;
        self.form_values = saved.form_values;
        self.last_status = saved.last_status;
        self.touch();
    }

    /// Replace the current history entry, e.g. with a redirect target.
    pub fn commit_location(&mut self, url: &str) {
        if self.url != url {
            self.url = url.to_string();
            if let Some(entry) = self.history.get_mut(self.history_index) {
                *entry = url.to_string();
            }
        }
        self.touch();
    }

    pub fn apply_snapshot(&mut self, snapshot: Snapshot, forms: Vec<Form>, raw: Option<String>) -> Arc<Snapshot> {
        self.commit_location(&snapshot.url);
        self.title = snapshot.title.clone();
        self.last_status = Some(snapshot.status);
        self.forms = forms;
        self.last_raw_document = raw;
        let snapshot = Arc::new(snapshot);
        self.last_snapshot = Some(snapshot.clone());
        snapshot
    }

    pub fn form(&self, index: usize) -> Result<&Form, BrowserError> {
        self.forms
            .iter()
            .find(|f| f.index == index)
            .ok_or(BrowserError::FormNotFound(index))
    }

    pub fn summary(&self, active: bool) -> TabSummary {
        TabSummary {
            id: self.id.clone(),
            url: self.url.clone(),
            title: self.title.clone(),
            active,
            created_at: self.created_at,
            updated_at: self.updated_at,
            history_index: self.history_index,
            history_length: self.history.len(),
            has_snapshot: self.last_snapshot.is_some(),
        }
    }
}

/// Saved by [`Tab::position`].
#[derive(Debug, Clone)]
pub struct TabPosition {
    url: String,
    history_index: usize,
    title: String,
    last_snapshot: Option<Arc<Snapshot>>,
    last_raw_document: Option<String>,
    forms: Vec<Form>,
    form_values: HashMap<usize, BTreeMap<String, String>>,
    last_status: Option<u16>,
}

/// Serializable view of a tab for result envelopes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSummary {
    pub id: String,
    pub url: String,
    pub title: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history_index: usize,
    pub history_length: usize,
    pub has_snapshot: bool,
}

/// Outcome of `back`/`forward`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryMove {
    pub moved: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// All tabs of one tool instance.
#[derive(Debug, Default)]
pub struct BrowserState {
    next_id: u64,
    active: Option<String>,
    tabs: Vec<Tab>,
}

impl BrowserState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every tab and restart numbering.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    fn allocate(&mut self, url: &Url) -> String {
        self.next_id += 1;
        let id = format!("t{}", self.next_id);
        self.tabs.push(Tab::new(id.clone(), url));
        id
    }

    /// New tab that becomes active.
    pub fn create_tab(&mut self, url: &Url) -> String {
        let id = self.allocate(url);
        self.active = Some(id.clone());
        id
    }

    /// New tab that leaves the active pointer alone.
    pub fn create_background_tab(&mut self, url: &Url) -> String {
        self.allocate(url)
    }

    pub fn get(&self, id: &str) -> Result<&Tab, BrowserError> {
        self.tabs
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| BrowserError::TabNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Tab, BrowserError> {
        self.tabs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| BrowserError::TabNotFound(id.to_string()))
    }

    /// Explicit tab id if given (must exist), else the active tab.
    pub fn resolve_id(&self, requested: Option<&str>) -> Result<String, BrowserError> {
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => self.get(id).map(|t| t.id.clone()),
            None => self.active.clone().ok_or(BrowserError::NoActiveTab),
        }
    }

    pub fn focus(&mut self, id: &str) -> Result<(), BrowserError> {
        self.get(id)?;
        self.active = Some(id.to_string());
        Ok(())
    }

    /// Push `url` onto the tab's history, dropping any forward entries.
    pub fn navigate(&mut self, id: &str, url: &Url) -> Result<&mut Tab, BrowserError> {
        let tab = self.get_mut(id)?;
        tab.history.truncate(tab.history_index + 1);
        tab.history.push(url.to_string());
        tab.history_index = tab.history.len() - 1;
        tab.url = url.to_string();
        tab.clear_page_state();
        Ok(tab)
    }

    pub fn back(&mut self, id: &str) -> Result<HistoryMove, BrowserError> {
        let tab = self.get_mut(id)?;
        if tab.history_index == 0 {
            return Ok(HistoryMove {
                moved: false,
                url: tab.url.clone(),
                reason: Some("already at the oldest history entry".to_string()),
            });
        }
        tab.history_index -= 1;
        Ok(Self::moved_to(tab))
    }

    pub fn forward(&mut self, id: &str) -> Result<HistoryMove, BrowserError> {
        let tab = self.get_mut(id)?;
        if tab.history_index + 1 >= tab.history.len() {
            return Ok(HistoryMove {
                moved: false,
                url: tab.url.clone(),
                reason: Some("already at the newest history entry".to_string()),
            });
        }
        tab.history_index += 1;
        Ok(Self::moved_to(tab))
    }

    fn moved_to(tab: &mut Tab) -> HistoryMove {
        tab.url = tab.history[tab.history_index].clone();
        tab.clear_page_state();
        HistoryMove {
            moved: true,
            url: tab.url.clone(),
            reason: None,
        }
    }

    /// Remove a tab. When it was active, the most recently added remaining
    /// tab becomes active.
    pub fn close(&mut self, id: &str) -> Result<Tab, BrowserError> {
        let pos = self
            .tabs
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| BrowserError::TabNotFound(id.to_string()))?;
        let tab = self.tabs.remove(pos);
        if self.active.as_deref() == Some(id) {
            self.active = self.tabs.last().map(|t| t.id.clone());
        }
        Ok(tab)
    }

    pub fn summaries(&self) -> Vec<TabSummary> {
        self.tabs
            .iter()
            .map(|t| t.summary(self.active.as_deref() == Some(t.id.as_str())))
            .collect()
    }
}

#[cfg(test)]
#[path = "tabs_tests.rs"]
mod tests;
