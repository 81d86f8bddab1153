//! [`LivePage`] on top of a CDP page session.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::cdp::error::CdpError;
use crate::cdp::protocol::{NetworkCookie, ScreenshotFormat};
use crate::cookies::Cookie;
use crate::driver::{LivePage, PageEvent};
use crate::error::BrowserError;

use super::core::PageSession;

const SELECT_OPTIONS: &str = r#"function(values) {
    if (!(this instanceof HTMLSelectElement)) { throw new Error('element is not a <select>'); }
    const wanted = new Set(values);
    const picked = [];
    for (const option of this.options) {
        const hit = wanted.has(option.value) || wanted.has(option.label) || wanted.has(option.text.trim());
        option.selected = hit && (this.multiple || picked.length === 0);
        if (option.selected) { picked.push(option.value); }
    }
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
    return picked;
}"#;

const SELECT_CONTENTS: &str = r#"function() {
    if (typeof this.select === 'function') { this.select(); return true; }
    if (this.isContentEditable) { document.execCommand('selectAll'); return true; }
    return false;
}"#;

fn decode_data(result: &Value) -> Result<Vec<u8>, CdpError> {
    let data = result["data"]
        .as_str()
        .ok_or_else(|| CdpError::InvalidResponse("Missing data".to_string()))?;
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| CdpError::InvalidResponse(format!("Invalid base64 payload: {}", e)))
}

pub(super) fn to_cookie(raw: NetworkCookie) -> Cookie {
    let host_only = !raw.domain.starts_with('.');
    let expires = if raw.expires > 0.0 {
        DateTime::<Utc>::from_timestamp(raw.expires as i64, 0)
    } else {
        None
    };
    Cookie {
        name: raw.name,
        value: raw.value,
        domain: raw.domain.trim_start_matches('.').to_ascii_lowercase(),
        host_only,
        path: if raw.path.is_empty() { "/".to_string() } else { raw.path },
        expires,
        secure: raw.secure,
    }
}

impl PageSession {
    fn viewport_center(&self) -> (f64, f64) {
        let (w, h) = *self.viewport.lock();
        (w as f64 / 2.0, h as f64 / 2.0)
    }
}

#[async_trait]
impl LivePage for PageSession {
    fn id(&self) -> &str {
        &self.target_id
    }

    async fn goto(&self, url: &str, timeout: Duration) -> Result<Option<u16>, BrowserError> {
        Ok(self.navigate(url, timeout).await?)
    }

    async fn reload(&self, timeout: Duration) -> Result<Option<u16>, BrowserError> {
        Ok(PageSession::reload(self, timeout).await?)
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<(), BrowserError> {
        Ok(self.wait_for_ready(timeout).await?)
    }

    async fn url(&self) -> Result<String, BrowserError> {
        Ok(self.get_url().await?)
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.get_title().await?)
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.get_content().await?)
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        Ok(PageSession::evaluate(self, expression).await?)
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let (_, x, y) = self.element_center(selector, timeout).await?;
        self.click_at(x, y).await?;
        Ok(())
    }

    async fn hover(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let (_, x, y) = self.element_center(selector, timeout).await?;
        self.mouse_move(x, y).await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> Result<(), BrowserError> {
        let node_id = self.wait_for_selector(selector, timeout).await?;
        self.focus(node_id).await?;
        let object_id = self.resolve_node(node_id).await?;
        self.call_function_on(&object_id, SELECT_CONTENTS, Vec::new())
            .await?;
        if value.is_empty() {
            self.press_key_combo("Backspace").await?;
        } else {
            self.type_text(value).await?;
        }
        Ok(())
    }

    async fn press(&self, key: &str, selector: Option<&str>) -> Result<(), BrowserError> {
        if let Some(selector) = selector {
            let node_id = self
                .query_selector(selector)
                .await?
                .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))?;
            self.focus(node_id).await?;
        }
        self.press_key_combo(key).await?;
        Ok(())
    }

    async fn select_options(&self, selector: &str, values: &[String]) -> Result<Vec<String>, BrowserError> {
        let picked = self
            .call_on_selector(selector, SELECT_OPTIONS, vec![json!(values)])
            .await?;
        Ok(picked
            .as_array()
            .map(|vals| {
                vals.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn drag(&self, from: &str, to: &str) -> Result<(), BrowserError> {
        let wait = Duration::from_secs(5);
        let (_, fx, fy) = self.element_center(from, wait).await?;
        let (_, tx, ty) = self.element_center(to, wait).await?;
        self.drag_between((fx, fy), (tx, ty)).await?;
        Ok(())
    }

    async fn set_input_files(&self, selector: &str, paths: &[PathBuf]) -> Result<(), BrowserError> {
        Ok(self.set_file_input_files(selector, paths).await?)
    }

    async fn scroll(&self, selector: Option<&str>, delta_x: f64, delta_y: f64) -> Result<(), BrowserError> {
        let (x, y) = match selector {
            Some(selector) => {
                let (_, x, y) = self.element_center(selector, Duration::from_secs(5)).await?;
                (x, y)
            }
            None => self.viewport_center(),
        };
        self.wheel(x, y, delta_x, delta_y).await?;
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), BrowserError> {
        Ok(self.apply_viewport(width, height).await?)
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        PageSession::wait_for_selector(self, selector, timeout).await?;
        Ok(())
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, BrowserError> {
        let result = self
            .call(
                "Page.captureScreenshot",
                Some(json!({
                    "format": ScreenshotFormat::Png,
                    "captureBeyondViewport": full_page,
                })),
            )
            .await?;
        Ok(decode_data(&result)?)
    }

    async fn pdf(&self) -> Result<Vec<u8>, BrowserError> {
        let result = self
            .call("Page.printToPDF", Some(json!({"printBackground": true})))
            .await?;
        Ok(decode_data(&result)?)
    }

    async fn handle_dialog(&self, accept: bool, prompt_text: Option<&str>) -> Result<(), BrowserError> {
        let mut params = json!({"accept": accept});
        if let Some(text) = prompt_text {
            params["promptText"] = json!(text);
        }
        self.call("Page.handleJavaScriptDialog", Some(params)).await?;
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        let url = self.get_url().await?;
        let result = self
            .call("Network.getCookies", Some(json!({"urls": [url]})))
            .await?;
        let raw: Vec<NetworkCookie> = serde_json::from_value(result["cookies"].clone())
            .map_err(CdpError::from)?;
        Ok(raw.into_iter().map(to_cookie).collect())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PageEvent>> {
        self.events.lock().take()
    }

    async fn close(&self) -> Result<(), BrowserError> {
        Ok(self.close_target().await?)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
