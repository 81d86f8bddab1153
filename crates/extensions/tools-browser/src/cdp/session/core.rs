//! Core session struct, event pump and CDP command dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};
use tracing::debug;

use crate::cdp::client::CdpClient;
use crate::cdp::error::CdpError;
use crate::cdp::protocol::{CdpResponse, ConsoleApiCalled, DialogOpening, ExceptionThrown};
use crate::driver::PageEvent;

/// What the browser-level event loop needs to reach an attached page.
pub(crate) struct RegisteredPage {
    pub events: mpsc::UnboundedSender<PageEvent>,
    pub closed: Arc<AtomicBool>,
    pub session_id: String,
}

/// Attached pages by target id.
pub(crate) type PageRegistry = Arc<Mutex<HashMap<String, RegisteredPage>>>;

/// Counts `Page.loadEventFired` so a navigation can wait for the load it
/// started rather than one that already happened.
#[derive(Default)]
pub(crate) struct LoadSignal {
    seq: AtomicU64,
    notify: Notify,
}

impl LoadSignal {
    pub(crate) fn current(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    pub(crate) fn bump(&self) {
        self.seq.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// True once a load newer than `seen` fired, false on timeout.
    pub(crate) async fn wait_past(&self, seen: u64, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.current() > seen {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

/// Map a raw page-session event to a [`PageEvent`].
pub(crate) fn translate_event(msg: &CdpResponse) -> Option<PageEvent> {
    match msg.method.as_deref()? {
        "Runtime.consoleAPICalled" => {
            let call: ConsoleApiCalled = msg.event_params("Runtime.consoleAPICalled")?;
            let text = call
                .args
                .iter()
                .map(|a| a.display())
                .collect::<Vec<_>>()
                .join(" ");
            let level = match call.call_type.as_str() {
                "warning" => "warn".to_string(),
                other => other.to_string(),
            };
            Some(PageEvent::Console { level, text })
        }
        "Runtime.exceptionThrown" => {
            let thrown: ExceptionThrown = msg.event_params("Runtime.exceptionThrown")?;
            Some(PageEvent::PageError {
                message: thrown.exception_details.message(),
            })
        }
        "Page.javascriptDialogOpening" => {
            let dialog: DialogOpening = msg.event_params("Page.javascriptDialogOpening")?;
            Some(PageEvent::Dialog {
                kind: dialog.dialog_type,
                message: dialog.message,
                default_prompt: dialog.default_prompt.filter(|p| !p.is_empty()),
            })
        }
        _ => None,
    }
}

/// A session attached to a single page/target.
pub struct PageSession {
    pub(super) target_id: String,
    pub(super) session_id: String,
    pub(super) client: Arc<CdpClient>,
    pub(super) registry: PageRegistry,
    pub(super) closed: Arc<AtomicBool>,
    pub(super) loads: Arc<LoadSignal>,
    pub(super) viewport: Mutex<(u32, u32)>,
    pub(super) events: Mutex<Option<mpsc::UnboundedReceiver<PageEvent>>>,
    pump: tokio::task::JoinHandle<()>,
}

impl PageSession {
    /// Attach to `target_id`, start translating its events and enable the
    /// domains the driver relies on.
    pub(crate) async fn attach(
        client: Arc<CdpClient>,
        target_id: &str,
        registry: PageRegistry,
        viewport: (u32, u32),
    ) -> Result<Arc<Self>, CdpError> {
        let session_id = client.attach(target_id).await?;
        let raw = client.subscribe(&session_id).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let loads = Arc::new(LoadSignal::default());

        registry.lock().insert(
            target_id.to_string(),
            RegisteredPage {
                events: tx.clone(),
                closed: closed.clone(),
                session_id: session_id.clone(),
            },
        );

        let pump = tokio::spawn(Self::pump(raw, tx, loads.clone()));
        let session = Arc::new(Self {
            target_id: target_id.to_string(),
            session_id,
            client,
            registry,
            closed,
            loads,
            viewport: Mutex::new(viewport),
            events: Mutex::new(Some(rx)),
            pump,
        });

        session.enable_domains().await?;
        session.apply_viewport(viewport.0, viewport.1).await?;
        Ok(session)
    }

    async fn pump(
        mut raw: mpsc::UnboundedReceiver<CdpResponse>,
        tx: mpsc::UnboundedSender<PageEvent>,
        loads: Arc<LoadSignal>,
    ) {
        while let Some(msg) = raw.recv().await {
            if msg.method.as_deref() == Some("Page.loadEventFired") {
                loads.bump();
                continue;
            }
            if let Some(event) = translate_event(&msg) {
                let _ = tx.send(event);
            }
        }
    }

    /// Get target ID.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Get session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(super) fn ensure_open(&self) -> Result<(), CdpError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CdpError::TargetClosed(self.target_id.clone()))
        } else {
            Ok(())
        }
    }

    /// Send a CDP command to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.ensure_open()?;
        let result = self.client.call(method, params, Some(&self.session_id)).await;
        self.closed_aware(result)
    }

    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, CdpError> {
        self.ensure_open()?;
        let result = self
            .client
            .call_with_timeout(method, params, Some(&self.session_id), timeout)
            .await;
        self.closed_aware(result)
    }

    fn closed_aware(&self, result: Result<Value, CdpError>) -> Result<Value, CdpError> {
        match result {
            Err(CdpError::SessionClosed) if self.closed.load(Ordering::SeqCst) => {
                Err(CdpError::TargetClosed(self.target_id.clone()))
            }
            other => other,
        }
    }

    /// Enable required CDP domains.
    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("DOM.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;

        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    pub(crate) async fn apply_viewport(&self, width: u32, height: u32) -> Result<(), CdpError> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            Some(json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            })),
        )
        .await?;
        *self.viewport.lock() = (width, height);
        Ok(())
    }

    /// Close the target. Safe to call more than once.
    pub async fn close_target(&self) -> Result<(), CdpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.registry.lock().remove(&self.target_id);
        self.client.unsubscribe(&self.session_id).await;
        self.client.close_target(&self.target_id).await
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
