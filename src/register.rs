//! Builds the browser tool from the loaded configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use webhands_config::{BrowserSection, Config, ConfigLoader};
use webhands_tools_browser::{
    find_chrome, BrowserTool, BrowserToolConfig, BufferCaps, ChromeDriver, EngineMode,
    LaunchOptions, LiveDriver, ReqwestFetcher, SnapshotLimits,
};

use crate::credentials::EnvCredentialStore;

fn non_empty_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(ConfigLoader::expand_path(value)))
    }
}

/// Map the config section onto the tool's runtime settings.
pub(crate) fn browser_config(section: &BrowserSection) -> BrowserToolConfig {
    let defaults = BrowserToolConfig::default();
    let default_engine = EngineMode::parse(&section.default_engine).unwrap_or_else(|| {
        warn!("Unknown default_engine '{}', using auto", section.default_engine);
        EngineMode::Auto
    });

    BrowserToolConfig {
        default_engine,
        allow_fallback: section.allow_fallback,
        navigation_timeout: Duration::from_millis(section.navigation_timeout_ms),
        action_timeout: Duration::from_millis(section.action_timeout_ms),
        popup_wait: Duration::from_millis(section.popup_wait_ms),
        snapshot_retries: section.snapshot_retries,
        limits: SnapshotLimits {
            max_chars: section.max_chars,
            max_bytes: section.max_bytes,
            max_links: section.max_links,
        },
        buffers: BufferCaps {
            console: section.console_buffer,
            dialogs: section.dialog_buffer,
        },
        artifacts_dir: non_empty_path(&section.artifacts_dir).unwrap_or(defaults.artifacts_dir),
        launch: LaunchOptions {
            headless: section.headless,
            chrome_path: non_empty_path(&section.chrome_path),
            debug_port: (section.debug_port != 0).then_some(section.debug_port),
            profile_dir: non_empty_path(&section.profile_dir),
            viewport: (section.viewport_width, section.viewport_height),
            user_agent: Some(section.user_agent.clone()).filter(|ua| !ua.is_empty()),
        },
        user_agent: section.user_agent.clone(),
    }
}

/// The live driver, unless disabled by config or flag.
fn live_driver(section: &BrowserSection, fetch_only: bool) -> Option<Arc<dyn LiveDriver>> {
    if fetch_only || !section.live_enabled {
        info!("Live engine disabled; running fetch-only");
        return None;
    }
    let chrome_path = non_empty_path(&section.chrome_path);
    if chrome_path.is_none() && find_chrome().is_none() {
        warn!("No Chrome or Chromium found; live actions will fall back to fetch");
    }
    Some(Arc::new(ChromeDriver::new(chrome_path)))
}

/// Create the browser tool with the environment credential store.
pub(crate) fn create_browser_tool(
    config: &Config,
    fetch_only: bool,
) -> Result<BrowserTool, Box<dyn std::error::Error>> {
    let tool_config = browser_config(&config.browser);
    let http = Arc::new(ReqwestFetcher::new(&tool_config.user_agent)?);
    let driver = live_driver(&config.browser, fetch_only);
    let credentials = Arc::new(EnvCredentialStore::new(config.credentials.env_prefix.clone()));
    Ok(BrowserTool::new(tool_config, http, driver).with_credentials(credentials))
}
