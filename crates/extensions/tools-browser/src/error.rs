//! Browser tool error types.

use thiserror::Error;

use webhands_protocols::{CredentialError, ToolError};

use crate::cdp::CdpError;
use crate::engine::Engine;

/// Coarse classification used by retry and fallback decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; surfaced immediately, never retried.
    Validation,
    /// Live navigation timeout or launch failure; eligible for fallback.
    Transient,
    /// Unknown tab, stale ref, missing form or field.
    NotFound,
    /// The resolved engine cannot perform the action.
    Unsupported,
    /// Anything else.
    Failed,
}

/// Browser tool errors.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Action '{action}' requires the live engine (resolved engine: {engine})")]
    RequiresLive { action: String, engine: Engine },

    #[error("Live engine unavailable: {0}")]
    LiveUnavailable(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Page closed: {0}")]
    PageClosed(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Tab not found: {0}")]
    TabNotFound(String),

    #[error("No active tab; open a page first")]
    NoActiveTab,

    #[error("Ref '{reference}' not found in the current snapshot of tab {tab}")]
    RefNotFound { reference: String, tab: String },

    #[error("Form {0} not found in the current snapshot")]
    FormNotFound(usize),

    #[error("Field '{field}' not found in form {form}")]
    FieldNotFound { form: usize, field: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("No link matches {0}")]
    LinkNotFound(String),

    #[error("No credential stored for any of: {0}")]
    CredentialNotFound(String),

    #[error("Credential lookup failed: {0}")]
    Credential(#[from] CredentialError),

    #[error("JavaScript error: {0}")]
    JavaScript(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrowserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) | Self::MissingParameter(_) | Self::InvalidParameter(_) => {
                ErrorKind::Validation
            }
            Self::LaunchFailed(_)
            | Self::ConnectionFailed(_)
            | Self::NavigationFailed(_)
            | Self::Timeout(_)
            | Self::PageClosed(_)
            | Self::Http(_) => ErrorKind::Transient,
            Self::TabNotFound(_)
            | Self::NoActiveTab
            | Self::RefNotFound { .. }
            | Self::FormNotFound(_)
            | Self::FieldNotFound { .. }
            | Self::ElementNotFound(_)
            | Self::LinkNotFound(_)
            | Self::CredentialNotFound(_) => ErrorKind::NotFound,
            Self::RequiresLive { .. } | Self::LiveUnavailable(_) => ErrorKind::Unsupported,
            Self::Credential(_) | Self::JavaScript(_) | Self::ActionFailed(_) | Self::Io(_) => {
                ErrorKind::Failed
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub(crate) fn requires_live(action: &str, engine: Engine) -> Self {
        Self::RequiresLive {
            action: action.to_string(),
            engine,
        }
    }
}

impl From<CdpError> for BrowserError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::ConnectionFailed(msg) | CdpError::ChromeNotAvailable(msg) => {
                BrowserError::ConnectionFailed(msg)
            }
            CdpError::WebSocket(msg) => BrowserError::ConnectionFailed(msg),
            CdpError::NavigationFailed(msg) => BrowserError::NavigationFailed(msg),
            CdpError::ElementNotFound(msg) => BrowserError::ElementNotFound(msg),
            CdpError::JavaScript(msg) => BrowserError::JavaScript(msg),
            CdpError::Timeout(msg) => BrowserError::Timeout(msg),
            CdpError::SessionClosed => BrowserError::PageClosed("CDP session closed".to_string()),
            CdpError::TargetClosed(id) => BrowserError::PageClosed(id),
            _ => BrowserError::ActionFailed(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for BrowserError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BrowserError::Timeout(e.to_string())
        } else {
            BrowserError::Http(e.to_string())
        }
    }
}

impl From<BrowserError> for ToolError {
    fn from(e: BrowserError) -> Self {
        match (&e, e.kind()) {
            (BrowserError::Timeout(msg), _) => ToolError::Timeout(msg.clone()),
            (_, ErrorKind::Validation) => ToolError::InvalidParameters(e.to_string()),
            (_, ErrorKind::NotFound) => ToolError::ResourceNotFound(e.to_string()),
            (_, ErrorKind::Unsupported) => ToolError::Unsupported(e.to_string()),
            _ => ToolError::ExecutionFailed(e.to_string()),
        }
    }
}
