//! Headless-browser capability interface.
//!
//! The live session manager only talks to these traits. The CDP-backed
//! implementation lives in [`crate::cdp`]; tests plug in an in-memory double.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::cookies::Cookie;
use crate::error::BrowserError;

/// How to start the browser process.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Executable override; `None` auto-detects.
    pub chrome_path: Option<PathBuf>,
    /// Remote debugging port; `None` picks a free one.
    pub debug_port: Option<u16>,
    /// Persistent profile; `None` uses a throwaway directory.
    pub profile_dir: Option<PathBuf>,
    pub viewport: (u32, u32),
    pub user_agent: Option<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            debug_port: None,
            profile_dir: None,
            viewport: (1280, 720),
            user_agent: None,
        }
    }
}

/// Something that happened on a page outside of a command.
#[derive(Clone)]
pub enum PageEvent {
    Console { level: String, text: String },
    PageError { message: String },
    /// The page is blocked until [`LivePage::handle_dialog`] answers.
    Dialog {
        kind: String,
        message: String,
        default_prompt: Option<String>,
    },
    /// A new page opened by this one (window.open, target=_blank).
    Popup(Arc<dyn LivePage>),
    Closed,
}

impl std::fmt::Debug for PageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Console { level, text } => write!(f, "Console({}: {})", level, text),
            Self::PageError { message } => write!(f, "PageError({})", message),
            Self::Dialog { kind, message, .. } => write!(f, "Dialog({}: {})", kind, message),
            Self::Popup(page) => write!(f, "Popup({})", page.id()),
            Self::Closed => f.write_str("Closed"),
        }
    }
}

/// Launches browsers.
#[async_trait]
pub trait LiveDriver: Send + Sync {
    /// Cheap check whether a launch could succeed at all.
    fn is_available(&self) -> bool;

    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn LiveBrowser>, BrowserError>;
}

#[async_trait]
pub trait LiveBrowser: Send + Sync {
    async fn new_context(&self) -> Result<Arc<dyn LiveContext>, BrowserError>;
    async fn close(&self) -> Result<(), BrowserError>;
}

/// An isolated browsing context (own cookies and storage).
#[async_trait]
pub trait LiveContext: Send + Sync {
    async fn new_page(&self) -> Result<Arc<dyn LivePage>, BrowserError>;
    async fn close(&self) -> Result<(), BrowserError>;
}

/// One rendered page. Element arguments are CSS selectors.
#[async_trait]
pub trait LivePage: Send + Sync {
    fn id(&self) -> &str;

    /// Navigate and wait for the load. Returns the main document status when
    /// the browser reports one.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<Option<u16>, BrowserError>;
    async fn reload(&self, timeout: Duration) -> Result<Option<u16>, BrowserError>;
    async fn wait_for_load(&self, timeout: Duration) -> Result<(), BrowserError>;

    async fn url(&self) -> Result<String, BrowserError>;
    async fn title(&self) -> Result<String, BrowserError>;
    /// Serialized DOM of the main frame.
    async fn content(&self) -> Result<String, BrowserError>;
    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError>;

    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;
    async fn hover(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;
    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> Result<(), BrowserError>;
    async fn press(&self, key: &str, selector: Option<&str>) -> Result<(), BrowserError>;
    /// Returns the values that ended up selected.
    async fn select_options(&self, selector: &str, values: &[String]) -> Result<Vec<String>, BrowserError>;
    async fn drag(&self, from: &str, to: &str) -> Result<(), BrowserError>;
    async fn set_input_files(&self, selector: &str, paths: &[PathBuf]) -> Result<(), BrowserError>;
    async fn scroll(&self, selector: Option<&str>, delta_x: f64, delta_y: f64) -> Result<(), BrowserError>;
    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), BrowserError>;
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// PNG bytes.
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, BrowserError>;
    async fn pdf(&self) -> Result<Vec<u8>, BrowserError>;

    async fn handle_dialog(&self, accept: bool, prompt_text: Option<&str>) -> Result<(), BrowserError>;
    /// Cookies visible to the current URL.
    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError>;

    /// Event stream of this page. Only the first caller gets it.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PageEvent>>;

    async fn close(&self) -> Result<(), BrowserError>;
    fn is_closed(&self) -> bool;
}
