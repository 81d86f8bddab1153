//! Tool execution results.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::Metadata;

/// What a tool hands back to its caller.
///
/// `content` is a one-line human summary; `structured_output` carries the
/// machine-readable envelope when the tool has one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,

    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<Value>,

    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl ToolResult {
    /// Summary only.
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            structured_output: None,
            metadata: Metadata::new(),
        }
    }

    /// Summary plus a structured envelope.
    pub fn success_json(content: impl Into<String>, output: Value) -> Self {
        Self {
            structured_output: Some(output),
            ..Self::success(content)
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The structured envelope, or a minimal `{ok, summary}` object for
    /// summary-only results.
    pub fn into_envelope(self) -> Value {
        match self.structured_output {
            Some(output) => output,
            None => json!({ "ok": self.success, "summary": self.content }),
        }
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
