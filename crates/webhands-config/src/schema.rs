//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserSection,

    #[serde(default)]
    pub credentials: CredentialsSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

/// Browser tool configuration.
///
/// Durations are plain milliseconds here; the tool converts them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSection {
    /// `auto`, `fetch` or `live`.
    #[serde(default = "default_engine")]
    pub default_engine: String,

    #[serde(default = "default_true")]
    pub allow_fallback: bool,

    /// Disables the headless-browser driver entirely when false.
    #[serde(default = "default_true")]
    pub live_enabled: bool,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Empty: auto-detect.
    #[serde(default)]
    pub chrome_path: String,

    /// 0: pick a free port.
    #[serde(default)]
    pub debug_port: u16,

    /// Empty: temporary profile.
    #[serde(default)]
    pub profile_dir: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_ms: u64,

    #[serde(default = "default_action_timeout")]
    pub action_timeout_ms: u64,

    #[serde(default = "default_popup_wait")]
    pub popup_wait_ms: u64,

    #[serde(default = "default_snapshot_retries")]
    pub snapshot_retries: u32,

    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    #[serde(default = "default_max_links")]
    pub max_links: usize,

    #[serde(default = "default_console_buffer")]
    pub console_buffer: usize,

    #[serde(default = "default_dialog_buffer")]
    pub dialog_buffer: usize,

    /// Empty: `<tmp>/webhands-artifacts`.
    #[serde(default)]
    pub artifacts_dir: String,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            default_engine: default_engine(),
            allow_fallback: true,
            live_enabled: true,
            headless: true,
            chrome_path: String::new(),
            debug_port: 0,
            profile_dir: String::new(),
            user_agent: default_user_agent(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            navigation_timeout_ms: default_navigation_timeout(),
            action_timeout_ms: default_action_timeout(),
            popup_wait_ms: default_popup_wait(),
            snapshot_retries: default_snapshot_retries(),
            max_chars: default_max_chars(),
            max_bytes: default_max_bytes(),
            max_links: default_max_links(),
            console_buffer: default_console_buffer(),
            dialog_buffer: default_dialog_buffer(),
            artifacts_dir: String::new(),
        }
    }
}

/// Where the environment credential store looks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsSection {
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
}

impl Default for CredentialsSection {
    fn default() -> Self {
        Self {
            env_prefix: default_env_prefix(),
        }
    }
}

/// Log output settings for the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Empty: `<data dir>/webhands/logs`.
    #[serde(default)]
    pub dir: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_engine() -> String {
    "auto".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; WebHands/0.1)".to_string()
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    720
}

fn default_navigation_timeout() -> u64 {
    20_000
}

fn default_action_timeout() -> u64 {
    10_000
}

fn default_popup_wait() -> u64 {
    1_500
}

fn default_snapshot_retries() -> u32 {
    1
}

fn default_max_chars() -> usize {
    12_000
}

fn default_max_bytes() -> usize {
    2_000_000
}

fn default_max_links() -> usize {
    80
}

fn default_console_buffer() -> usize {
    400
}

fn default_dialog_buffer() -> usize {
    80
}

fn default_env_prefix() -> String {
    "WEBHANDS_CRED".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_defaults() {
        let browser = BrowserSection::default();
        assert_eq!(browser.default_engine, "auto");
        assert!(browser.headless);
        assert_eq!(browser.navigation_timeout_ms, 20_000);
        assert_eq!(browser.console_buffer, 400);
        assert_eq!(browser.dialog_buffer, 80);
    }

    #[test]
    fn test_partial_section_uses_field_defaults() {
        let config: Config = toml::from_str("[browser]\nheadless = false\n").unwrap();
        assert!(!config.browser.headless);
        assert_eq!(config.browser.max_chars, 12_000);
        assert_eq!(config.credentials.env_prefix, "WEBHANDS_CRED");
    }

    #[test]
    fn test_roundtrip_keeps_values() {
        let mut config = Config::default();
        config.browser.max_links = 5;
        let text = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.browser.max_links, 5);
    }
}
