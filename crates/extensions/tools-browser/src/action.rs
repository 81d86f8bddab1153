//! Typed action requests.
//!
//! `params.action` selects one variant; each variant carries only the fields
//! that action reads. Fields shared by every action live in [`CommonParams`].

use serde::Deserialize;
use serde_json::Value;

use crate::error::BrowserError;
use crate::params::{lenient_f64, one_or_many, string_like, CommonParams};

/// Interactions an `act` envelope may dispatch to.
pub const ACT_KINDS: &[&str] = &[
    "click", "fill", "hover", "press", "select", "drag", "scroll", "wait", "evaluate", "submit",
];

/// One browser action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BrowserAction {
    Open {
        url: String,
        #[serde(default)]
        background: bool,
    },
    Navigate {
        url: String,
    },
    Reload,
    Back,
    Forward,
    Snapshot,
    Click {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default, rename = "ref")]
        reference: Option<String>,
        #[serde(default, deserialize_with = "lenient_f64")]
        index: Option<f64>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default, alias = "focus")]
        focus_popup: Option<bool>,
    },
    Fill {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default, rename = "ref")]
        reference: Option<String>,
        #[serde(default, alias = "form", deserialize_with = "lenient_f64")]
        form_index: Option<f64>,
        #[serde(default, alias = "name")]
        field: Option<String>,
        #[serde(deserialize_with = "string_like")]
        value: String,
    },
    Submit {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default, rename = "ref")]
        reference: Option<String>,
        #[serde(default, alias = "form", deserialize_with = "lenient_f64")]
        form_index: Option<f64>,
    },
    Hover {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default, rename = "ref")]
        reference: Option<String>,
    },
    Press {
        key: String,
        #[serde(default)]
        selector: Option<String>,
        #[serde(default, rename = "ref")]
        reference: Option<String>,
    },
    Select {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default, rename = "ref")]
        reference: Option<String>,
        #[serde(default, alias = "value", deserialize_with = "one_or_many")]
        values: Vec<String>,
    },
    Drag {
        #[serde(default)]
        from_selector: Option<String>,
        #[serde(default)]
        from_ref: Option<String>,
        #[serde(default)]
        to_selector: Option<String>,
        #[serde(default)]
        to_ref: Option<String>,
    },
    Evaluate {
        #[serde(alias = "script", alias = "fn")]
        expression: String,
    },
    Upload {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default, rename = "ref")]
        reference: Option<String>,
        #[serde(default, alias = "path", alias = "files", deserialize_with = "one_or_many")]
        paths: Vec<String>,
    },
    Scroll {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default, rename = "ref")]
        reference: Option<String>,
        #[serde(default, deserialize_with = "lenient_f64")]
        delta_x: Option<f64>,
        #[serde(default, deserialize_with = "lenient_f64")]
        delta_y: Option<f64>,
    },
    Resize {
        #[serde(default, deserialize_with = "lenient_f64")]
        width: Option<f64>,
        #[serde(default, deserialize_with = "lenient_f64")]
        height: Option<f64>,
    },
    Wait {
        #[serde(default, alias = "timeMs", deserialize_with = "lenient_f64")]
        ms: Option<f64>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        url_contains: Option<String>,
    },
    Screenshot {
        #[serde(default)]
        full_page: bool,
        #[serde(default, deserialize_with = "lenient_f64")]
        width: Option<f64>,
        #[serde(default, deserialize_with = "lenient_f64")]
        height: Option<f64>,
    },
    Pdf,
    Console {
        #[serde(default, deserialize_with = "lenient_f64")]
        limit: Option<f64>,
        #[serde(default)]
        level: Option<String>,
        #[serde(default)]
        clear: bool,
    },
    Dialog {
        #[serde(default)]
        accept: Option<bool>,
        #[serde(default)]
        prompt_text: Option<String>,
        #[serde(default)]
        once: Option<bool>,
        #[serde(default, deserialize_with = "lenient_f64")]
        limit: Option<f64>,
    },
    Login {
        #[serde(default)]
        service: Option<String>,
    },
    Mfa {
        #[serde(deserialize_with = "string_like")]
        code: String,
    },
    Tabs,
    Focus,
    Close,
    Reset,
    OpenExternal {
        url: String,
    },
}

impl BrowserAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Navigate { .. } => "navigate",
            Self::Reload => "reload",
            Self::Back => "back",
            Self::Forward => "forward",
            Self::Snapshot => "snapshot",
            Self::Click { .. } => "click",
            Self::Fill { .. } => "fill",
            Self::Submit { .. } => "submit",
            Self::Hover { .. } => "hover",
            Self::Press { .. } => "press",
            Self::Select { .. } => "select",
            Self::Drag { .. } => "drag",
            Self::Evaluate { .. } => "evaluate",
            Self::Upload { .. } => "upload",
            Self::Scroll { .. } => "scroll",
            Self::Resize { .. } => "resize",
            Self::Wait { .. } => "wait",
            Self::Screenshot { .. } => "screenshot",
            Self::Pdf => "pdf",
            Self::Console { .. } => "console",
            Self::Dialog { .. } => "dialog",
            Self::Login { .. } => "login",
            Self::Mfa { .. } => "mfa",
            Self::Tabs => "tabs",
            Self::Focus => "focus",
            Self::Close => "close",
            Self::Reset => "reset",
            Self::OpenExternal { .. } => "open_external",
        }
    }

    /// Actions that need a rendered page and fail fast on the fetch engine.
    pub fn requires_live(&self) -> bool {
        matches!(
            self,
            Self::Hover { .. }
                | Self::Press { .. }
                | Self::Select { .. }
                | Self::Drag { .. }
                | Self::Evaluate { .. }
                | Self::Upload { .. }
                | Self::Dialog { .. }
                | Self::Console { .. }
                | Self::Pdf
                | Self::Scroll { .. }
                | Self::Resize { .. }
                | Self::Screenshot { .. }
        )
    }

    /// Navigation-class actions share the live→fetch fallback policy.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::Open { .. } | Self::Navigate { .. } | Self::Reload | Self::Back | Self::Forward
        )
    }
}

/// A parsed call: the action plus the shared parameters.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub action: BrowserAction,
    pub common: CommonParams,
    /// Set when the call arrived as `{action: "act", kind: ...}`.
    pub via_act: bool,
}

impl ActionRequest {
    pub fn parse(params: &Value) -> Result<Self, BrowserError> {
        let obj = params.as_object().ok_or_else(|| {
            BrowserError::InvalidParameter("parameters must be a JSON object".to_string())
        })?;
        let name = obj
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::MissingParameter("action".to_string()))?;

        let mut value = params.clone();
        let mut via_act = false;
        if name == "act" {
            let kind = obj
                .get("kind")
                .and_then(Value::as_str)
                .ok_or_else(|| BrowserError::MissingParameter("kind".to_string()))?;
            if kind == "act" {
                return Err(BrowserError::InvalidParameter(
                    "act cannot dispatch to act".to_string(),
                ));
            }
            if !ACT_KINDS.contains(&kind) {
                return Err(BrowserError::InvalidParameter(format!(
                    "act kind '{}' is not an interaction (expected one of: {})",
                    kind,
                    ACT_KINDS.join(", ")
                )));
            }
            value["action"] = Value::String(kind.to_string());
            via_act = true;
        }

        let action: BrowserAction = serde_json::from_value(value.clone()).map_err(map_serde_error)?;
        let common: CommonParams = serde_json::from_value(value).map_err(map_serde_error)?;
        Ok(Self {
            action,
            common,
            via_act,
        })
    }
}

fn map_serde_error(e: serde_json::Error) -> BrowserError {
    let msg = e.to_string();
    if let Some(rest) = msg.strip_prefix("missing field `") {
        let field = rest.split('`').next().unwrap_or(rest);
        BrowserError::MissingParameter(field.to_string())
    } else if msg.starts_with("unknown variant") {
        BrowserError::InvalidParameter(format!("unknown action: {}", msg))
    } else {
        BrowserError::InvalidParameter(msg)
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
