//! Live session manager: one browser, one context, one page per tab.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::driver::{LaunchOptions, LiveBrowser, LiveContext, LiveDriver, LivePage, PageEvent};
use crate::error::BrowserError;

use super::buffers::{
    BufferCaps, ConsoleEntry, DialogEvent, DialogPlan, TabBuffers, PAGE_ERROR_LEVEL,
};

struct LiveSession {
    browser: Arc<dyn LiveBrowser>,
    context: Arc<dyn LiveContext>,
}

struct PageSlot {
    page: Arc<dyn LivePage>,
    buffers: Arc<Mutex<TabBuffers>>,
    listener: Option<JoinHandle<()>>,
}

/// A page opened by another tab's page, waiting to become a tab.
pub struct PendingPopup {
    pub opener_tab: String,
    pub page: Arc<dyn LivePage>,
}

type PageMap = Arc<RwLock<HashMap<String, PageSlot>>>;

/// Owns the live browser and maps tab ids to pages.
pub struct LiveSessionManager {
    driver: Option<Arc<dyn LiveDriver>>,
    options: LaunchOptions,
    caps: BufferCaps,
    /// Held across launch so concurrent first uses start one browser.
    session: tokio::sync::Mutex<Option<LiveSession>>,
    pages: PageMap,
    popups: Arc<Mutex<Vec<PendingPopup>>>,
    popup_ready: Arc<Notify>,
}

impl LiveSessionManager {
    /// `driver = None` disables the live engine.
    pub fn new(driver: Option<Arc<dyn LiveDriver>>, options: LaunchOptions, caps: BufferCaps) -> Self {
        Self {
            driver,
            options,
            caps,
            session: tokio::sync::Mutex::new(None),
            pages: Arc::default(),
            popups: Arc::default(),
            popup_ready: Arc::new(Notify::new()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.driver.as_ref().is_some_and(|d| d.is_available())
    }

    /// Launch the browser and context on first use.
    async fn context(&self) -> Result<Arc<dyn LiveContext>, BrowserError> {
        let mut session = self.session.lock().await;
        if let Some(existing) = session.as_ref() {
            return Ok(existing.context.clone());
        }

        let driver = self
            .driver
            .as_ref()
            .filter(|d| d.is_available())
            .ok_or_else(|| BrowserError::LiveUnavailable("no headless browser driver".to_string()))?;

        info!("Starting live browser session");
        let browser = driver.launch(&self.options).await?;
        let context = match browser.new_context().await {
            Ok(context) => context,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    debug!("Closing half-started browser failed: {}", close_err);
                }
                return Err(e);
            }
        };
        *session = Some(LiveSession {
            browser,
            context: context.clone(),
        });
        Ok(context)
    }

    /// The open page of `tab`, if any. Pages that closed themselves are
    /// released here.
    pub fn page(&self, tab: &str) -> Option<Arc<dyn LivePage>> {
        let page = self.pages.read().get(tab).map(|slot| slot.page.clone())?;
        if page.is_closed() {
            self.forget(tab);
            return None;
        }
        Some(page)
    }

    pub fn has_page(&self, tab: &str) -> bool {
        self.page(tab).is_some()
    }

    /// The page of `tab`, opening one in the shared context if needed.
    pub async fn open_page(&self, tab: &str) -> Result<Arc<dyn LivePage>, BrowserError> {
        if let Some(page) = self.page(tab) {
            return Ok(page);
        }
        let context = self.context().await?;
        let page = context.new_page().await?;
        debug!("Opened live page {} for tab {}", page.id(), tab);
        self.attach(tab, page.clone());
        Ok(page)
    }

    /// Bind `page` to `tab` and start recording its events. Re-attaching the
    /// same page is a no-op; a different page replaces the old binding.
    pub fn attach(&self, tab: &str, page: Arc<dyn LivePage>) {
        let mut pages = self.pages.write();
        if let Some(slot) = pages.get(tab) {
            if slot.page.id() == page.id() {
                return;
            }
        }

        let buffers = Arc::new(Mutex::new(TabBuffers::new(self.caps)));
        let listener = page.take_events().map(|events| {
            tokio::spawn(listen(
                tab.to_string(),
                page.clone(),
                events,
                buffers.clone(),
                self.pages.clone(),
                self.popups.clone(),
                self.popup_ready.clone(),
            ))
        });
        if listener.is_none() {
            warn!("Page {} events already taken; console and dialogs go unrecorded", page.id());
        }

        let previous = pages.insert(
            tab.to_string(),
            PageSlot {
                page,
                buffers,
                listener,
            },
        );
        drop(pages);

        if let Some(old) = previous {
            if let Some(listener) = old.listener {
                listener.abort();
            }
            tokio::spawn(async move {
                if let Err(e) = old.page.close().await {
                    debug!("Closing replaced page failed: {}", e);
                }
            });
        }
    }

    /// Wait up to `timeout` for a popup opened by `opener_tab`'s page.
    pub async fn wait_for_popup(&self, opener_tab: &str, timeout: Duration) -> Option<Arc<dyn LivePage>> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.popup_ready.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if let Some(page) = self.take_popup(opener_tab) {
                    return page;
                }
                notified.await;
            }
        })
        .await
        .ok()
    }

    fn take_popup(&self, opener_tab: &str) -> Option<Arc<dyn LivePage>> {
        let mut popups = self.popups.lock();
        let position = popups.iter().position(|p| p.opener_tab == opener_tab)?;
        Some(popups.remove(position).page)
    }

    /// Every popup not yet claimed by a click.
    pub fn drain_popups(&self) -> Vec<PendingPopup> {
        std::mem::take(&mut *self.popups.lock())
    }

    fn buffers(&self, tab: &str) -> Result<Arc<Mutex<TabBuffers>>, BrowserError> {
        self.pages
            .read()
            .get(tab)
            .map(|slot| slot.buffers.clone())
            .ok_or_else(|| BrowserError::PageClosed(format!("tab {} has no live page", tab)))
    }

    pub fn console(
        &self,
        tab: &str,
        limit: usize,
        level: Option<&str>,
        clear: bool,
    ) -> Result<Vec<ConsoleEntry>, BrowserError> {
        Ok(self.buffers(tab)?.lock().console(limit, level, clear))
    }

    pub fn dialogs(&self, tab: &str, limit: usize) -> Result<Vec<DialogEvent>, BrowserError> {
        Ok(self.buffers(tab)?.lock().dialogs(limit))
    }

    /// Answer future dialogs on `tab` according to `plan`.
    pub fn arm_dialog(&self, tab: &str, plan: DialogPlan) -> Result<(), BrowserError> {
        self.buffers(tab)?.lock().arm(plan);
        Ok(())
    }

    pub fn armed_dialog(&self, tab: &str) -> Option<DialogPlan> {
        let buffers = self.buffers(tab).ok()?;
        let plan = buffers.lock().plan().cloned();
        plan
    }

    fn forget(&self, tab: &str) -> Option<PageSlot> {
        let slot = self.pages.write().remove(tab)?;
        self.popups.lock().retain(|p| p.opener_tab != tab);
        Some(slot)
    }

    /// Release the page of `tab`. Safe to call for tabs without one.
    pub async fn close(&self, tab: &str) {
        let Some(slot) = self.forget(tab) else {
            return;
        };
        if let Some(listener) = slot.listener {
            listener.abort();
        }
        if !slot.page.is_closed() {
            if let Err(e) = slot.page.close().await {
                debug!("Closing page of tab {} failed: {}", tab, e);
            }
        }
        debug!("Released live page of tab {}", tab);
    }

    /// Close every page, then the context, then the browser.
    pub async fn reset(&self) {
        let tabs: Vec<String> = self.pages.read().keys().cloned().collect();
        for tab in tabs {
            self.close(&tab).await;
        }
        for popup in self.drain_popups() {
            if let Err(e) = popup.page.close().await {
                debug!("Closing unclaimed popup failed: {}", e);
            }
        }

        let session = self.session.lock().await.take();
        if let Some(session) = session {
            if let Err(e) = session.context.close().await {
                warn!("Closing browser context failed: {}", e);
            }
            if let Err(e) = session.browser.close().await {
                warn!("Closing browser failed: {}", e);
            }
            info!("Live browser session closed");
        }
    }
}

async fn listen(
    tab: String,
    page: Arc<dyn LivePage>,
    mut events: mpsc::UnboundedReceiver<PageEvent>,
    buffers: Arc<Mutex<TabBuffers>>,
    pages: PageMap,
    popups: Arc<Mutex<Vec<PendingPopup>>>,
    popup_ready: Arc<Notify>,
) {
    while let Some(event) = events.recv().await {
        match event {
            PageEvent::Console { level, text } => buffers.lock().push_console(level, text),
            PageEvent::PageError { message } => buffers.lock().push_console(PAGE_ERROR_LEVEL, message),
            PageEvent::Dialog {
                kind,
                message,
                default_prompt,
            } => {
                let plan = buffers.lock().take_plan_for_dialog();
                let (accept, prompt_text) = match plan {
                    Some(plan) => (plan.accept, plan.prompt_text),
                    None => (false, None),
                };
                let prompt_text = if accept && kind == "prompt" {
                    prompt_text.or_else(|| default_prompt.clone())
                } else {
                    None
                };
                let outcome = match page.handle_dialog(accept, prompt_text.as_deref()).await {
                    Ok(()) if accept => "accepted".to_string(),
                    Ok(()) => "dismissed".to_string(),
                    Err(e) => format!("error: {}", e),
                };
                debug!("Dialog on tab {} ({}): {}", tab, kind, outcome);
                buffers.lock().push_dialog(DialogEvent {
                    kind,
                    message,
                    default_prompt,
                    outcome,
                    timestamp: Utc::now(),
                });
            }
            PageEvent::Popup(popup) => {
                debug!("Tab {} opened popup {}", tab, popup.id());
                popups.lock().push(PendingPopup {
                    opener_tab: tab.clone(),
                    page: popup,
                });
                popup_ready.notify_waiters();
            }
            PageEvent::Closed => {
                let mut pages = pages.write();
                if pages.get(&tab).is_some_and(|slot| slot.page.id() == page.id()) {
                    pages.remove(&tab);
                    debug!("Page of tab {} closed itself", tab);
                }
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
