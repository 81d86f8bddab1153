//! DOM operations for CDP page session.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;

use crate::cdp::error::CdpError;
use crate::cdp::protocol::BoxModel;

use super::core::PageSession;

impl PageSession {
    async fn document_node(&self) -> Result<i64, CdpError> {
        let result = self
            .call("DOM.getDocument", Some(json!({"depth": 0})))
            .await?;
        result["root"]["nodeId"]
            .as_i64()
            .ok_or_else(|| CdpError::InvalidResponse("Missing root nodeId".to_string()))
    }

    /// Query selector.
    pub async fn query_selector(&self, selector: &str) -> Result<Option<i64>, CdpError> {
        let root = self.document_node().await?;

        let result = self
            .call(
                "DOM.querySelector",
                Some(json!({
                    "nodeId": root,
                    "selector": selector,
                })),
            )
            .await;

        // An unparsable selector is reported as a protocol error.
        let result = match result {
            Ok(r) => r,
            Err(CdpError::Protocol { message, .. }) => {
                return Err(CdpError::ElementNotFound(format!("{} ({})", selector, message)));
            }
            Err(e) => return Err(e),
        };

        let node_id = result["nodeId"].as_i64().unwrap_or(0);
        if node_id == 0 {
            Ok(None)
        } else {
            Ok(Some(node_id))
        }
    }

    /// Get box model for node.
    pub async fn get_box_model(&self, node_id: i64) -> Result<Option<BoxModel>, CdpError> {
        let result = self
            .call("DOM.getBoxModel", Some(json!({"nodeId": node_id})))
            .await;

        match result {
            Ok(r) => {
                let model: BoxModel = serde_json::from_value(r["model"].clone())?;
                Ok(Some(model))
            }
            Err(CdpError::Protocol { code: -32000, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolve node to a runtime object id.
    pub async fn resolve_node(&self, node_id: i64) -> Result<String, CdpError> {
        let result = self
            .call("DOM.resolveNode", Some(json!({"nodeId": node_id})))
            .await?;

        result["object"]["objectId"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::InvalidResponse("Missing objectId".to_string()))
    }

    /// Focus element.
    pub async fn focus(&self, node_id: i64) -> Result<(), CdpError> {
        self.call("DOM.focus", Some(json!({"nodeId": node_id})))
            .await?;
        Ok(())
    }

    /// Wait for `selector`, scroll it into view and return its center.
    pub async fn element_center(&self, selector: &str, timeout: Duration) -> Result<(i64, f64, f64), CdpError> {
        let node_id = self.wait_for_selector(selector, timeout).await?;
        // Not every node can be scrolled (e.g. inside closed shadow roots).
        let _ = self
            .call("DOM.scrollIntoViewIfNeeded", Some(json!({"nodeId": node_id})))
            .await;

        let box_model = self
            .get_box_model(node_id)
            .await?
            .ok_or_else(|| CdpError::ElementNotFound(format!("{} (not visible)", selector)))?;

        let (x, y) = Self::quad_center(&box_model.content);
        Ok((node_id, x, y))
    }

    /// Point file inputs at local files.
    pub async fn set_file_input_files(&self, selector: &str, paths: &[PathBuf]) -> Result<(), CdpError> {
        let node_id = self
            .query_selector(selector)
            .await?
            .ok_or_else(|| CdpError::ElementNotFound(selector.to_string()))?;
        let files: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        self.call(
            "DOM.setFileInputFiles",
            Some(json!({"files": files, "nodeId": node_id})),
        )
        .await?;
        Ok(())
    }

    /// Get page HTML content.
    pub async fn get_content(&self) -> Result<String, CdpError> {
        let result = self.evaluate("document.documentElement.outerHTML").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    /// Calculate center point of a quad.
    pub(super) fn quad_center(quad: &[f64]) -> (f64, f64) {
        if quad.len() >= 8 {
            let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
            let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;
            (x, y)
        } else {
            (0.0, 0.0)
        }
    }
}
