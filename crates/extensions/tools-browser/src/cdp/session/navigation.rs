//! Navigation operations for CDP page session.

use std::time::{Duration, Instant};

use serde_json::json;
use tracing::debug;

use crate::cdp::error::CdpError;

use super::core::PageSession;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

impl PageSession {
    /// Navigate to URL and wait for its load event. Returns the document
    /// status when the browser exposes it.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<Option<u16>, CdpError> {
        let seen = self.loads.current();
        let result = self
            .call_with_timeout("Page.navigate", Some(json!({"url": url})), timeout)
            .await?;

        if let Some(error) = result.get("errorText").and_then(|e| e.as_str()) {
            return Err(CdpError::NavigationFailed(format!("{}: {}", url, error)));
        }

        // Same-document navigations carry no loader and fire no load event.
        if result.get("loaderId").is_some() {
            self.wait_for_load_event(seen, timeout).await?;
        }

        debug!("Navigated to {}", url);
        Ok(self.response_status().await)
    }

    /// Reload page.
    pub async fn reload(&self, timeout: Duration) -> Result<Option<u16>, CdpError> {
        let seen = self.loads.current();
        self.call("Page.reload", None).await?;
        self.wait_for_load_event(seen, timeout).await?;
        Ok(self.response_status().await)
    }

    async fn wait_for_load_event(&self, seen: u64, timeout: Duration) -> Result<(), CdpError> {
        if self.loads.wait_past(seen, timeout).await {
            Ok(())
        } else {
            Err(CdpError::Timeout(format!(
                "page load did not finish within {}ms",
                timeout.as_millis()
            )))
        }
    }

    /// Wait until `document.readyState` settles.
    pub async fn wait_for_ready(&self, timeout: Duration) -> Result<(), CdpError> {
        let start = Instant::now();

        loop {
            let result = self.evaluate("document.readyState").await?;

            if let Some(state) = result.as_str() {
                if state == "complete" || state == "interactive" {
                    return Ok(());
                }
            }

            if start.elapsed() > timeout {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// HTTP status of the current document, if reported.
    pub async fn response_status(&self) -> Option<u16> {
        let value = self
            .evaluate(
                "(() => { const n = performance.getEntriesByType('navigation')[0]; \
                 return n && n.responseStatus ? n.responseStatus : null; })()",
            )
            .await
            .ok()?;
        value.as_u64().and_then(|s| u16::try_from(s).ok()).filter(|s| *s > 0)
    }

    /// Get current URL.
    pub async fn get_url(&self) -> Result<String, CdpError> {
        let result = self.evaluate("window.location.href").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    /// Get page title.
    pub async fn get_title(&self) -> Result<String, CdpError> {
        let result = self.evaluate("document.title").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    /// Wait for selector to appear; returns its node id.
    pub async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<i64, CdpError> {
        let start = Instant::now();

        loop {
            if let Some(node_id) = self.query_selector(selector).await? {
                return Ok(node_id);
            }

            if start.elapsed() > timeout {
                return Err(CdpError::ElementNotFound(format!(
                    "'{}' did not appear within {}ms",
                    selector,
                    timeout.as_millis()
                )));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
