//! Page-level live actions: viewport, artifacts, console and dialogs.

use std::path::PathBuf;

use chrono::Utc;
use serde_json::json;
use tracing::debug;

use super::{BrowserTool, CallOptions, Outcome};
use crate::engine::Engine;
use crate::error::BrowserError;
use crate::live::DialogPlan;
use crate::params;

impl BrowserTool {
    fn dimensions(&self, width: Option<f64>, height: Option<f64>) -> (u32, u32) {
        let (default_w, default_h) = self.config.viewport();
        (
            params::DIMENSION.clamp(width, default_w as f64) as u32,
            params::DIMENSION.clamp(height, default_h as f64) as u32,
        )
    }

    /// Write `bytes` to `<artifacts_dir>/<tab>-<timestamp>.<ext>`.
    async fn write_artifact(&self, tab_id: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf, BrowserError> {
        let dir = &self.config.artifacts_dir;
        tokio::fs::create_dir_all(dir).await?;
        let name = format!("{}-{}.{}", tab_id, Utc::now().format("%Y%m%dT%H%M%S%3f"), ext);
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }

    fn artifact_outcome(&self, tab_id: &str, path: PathBuf, bytes: usize, mime: &str) -> Outcome {
        Outcome::on(Engine::Live, tab_id)
            .with_snapshot(self.current_snapshot(tab_id))
            .with("path", path.to_string_lossy().into_owned())
            .with("bytes", bytes)
            .with("mimeType", mime)
    }

    pub(super) async fn resize(&self, call: &CallOptions, width: Option<f64>, height: Option<f64>) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.live_target("resize", call)?;
        let page = self.ensure_live_page(&tab_id, call).await?;
        let (width, height) = self.dimensions(width, height);
        page.set_viewport(width, height).await?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(self.current_snapshot(&tab_id))
            .with_decision(&decision)
            .with("viewport", json!({ "width": width, "height": height })))
    }

    pub(super) async fn screenshot(
        &self,
        call: &CallOptions,
        full_page: bool,
        width: Option<f64>,
        height: Option<f64>,
    ) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.live_target("screenshot", call)?;
        let page = self.ensure_live_page(&tab_id, call).await?;
        if width.is_some() || height.is_some() {
            let (width, height) = self.dimensions(width, height);
            page.set_viewport(width, height).await?;
        }
        let png = page.screenshot(full_page).await?;
        let path = self.write_artifact(&tab_id, "png", &png).await?;
        Ok(self
            .artifact_outcome(&tab_id, path, png.len(), "image/png")
            .with_decision(&decision)
            .with("fullPage", full_page))
    }

    pub(super) async fn pdf(&self, call: &CallOptions) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.live_target("pdf", call)?;
        let page = self.ensure_live_page(&tab_id, call).await?;
        let pdf = page.pdf().await?;
        let path = self.write_artifact(&tab_id, "pdf", &pdf).await?;
        Ok(self
            .artifact_outcome(&tab_id, path, pdf.len(), "application/pdf")
            .with_decision(&decision))
    }

    pub(super) async fn console(
        &self,
        call: &CallOptions,
        limit: usize,
        level: Option<String>,
        clear: bool,
    ) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.live_target("console", call)?;
        self.ensure_live_page(&tab_id, call).await?;
        let level = level.filter(|l| !l.trim().is_empty());
        let entries = self.live.console(&tab_id, limit, level.as_deref(), clear)?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(self.current_snapshot(&tab_id))
            .with_decision(&decision)
            .with("entries", json!(entries)))
    }

    /// Arm a plan when `accept` is given, then report recent dialogs.
    pub(super) async fn dialog(
        &self,
        call: &CallOptions,
        accept: Option<bool>,
        prompt_text: Option<String>,
        once: Option<bool>,
        limit: usize,
    ) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.live_target("dialog", call)?;
        self.ensure_live_page(&tab_id, call).await?;
        if let Some(accept) = accept {
            self.live.arm_dialog(
                &tab_id,
                DialogPlan {
                    accept,
                    prompt_text,
                    once: once.unwrap_or(true),
                },
            )?;
        }
        let events = self.live.dialogs(&tab_id, limit)?;
        Ok(Outcome::on(Engine::Live, &tab_id)
            .with_snapshot(self.current_snapshot(&tab_id))
            .with_decision(&decision)
            .with("armed", json!(self.live.armed_dialog(&tab_id)))
            .with("events", json!(events)))
    }
}
