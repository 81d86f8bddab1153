//! Browser tool configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::driver::LaunchOptions;
use crate::engine::EngineMode;
use crate::live::BufferCaps;
use crate::snapshot::SnapshotLimits;

/// Runtime settings of a [`crate::BrowserTool`].
#[derive(Debug, Clone)]
pub struct BrowserToolConfig {
    /// Engine used when a call does not ask for one.
    pub default_engine: EngineMode,
    /// Whether a failed live attempt may be retried on fetch by default.
    pub allow_fallback: bool,
    pub navigation_timeout: Duration,
    pub action_timeout: Duration,
    /// How long a live click waits for a popup before settling.
    pub popup_wait: Duration,
    /// Extra fetch attempts when capturing a snapshot.
    pub snapshot_retries: u32,
    pub limits: SnapshotLimits,
    pub buffers: BufferCaps,
    /// Screenshots and PDFs land here.
    pub artifacts_dir: PathBuf,
    pub launch: LaunchOptions,
    /// Sent by the fetch engine.
    pub user_agent: String,
}

impl Default for BrowserToolConfig {
    fn default() -> Self {
        Self {
            default_engine: EngineMode::Auto,
            allow_fallback: true,
            navigation_timeout: Duration::from_millis(20_000),
            action_timeout: Duration::from_millis(10_000),
            popup_wait: Duration::from_millis(1_500),
            snapshot_retries: 1,
            limits: SnapshotLimits::default(),
            buffers: BufferCaps::default(),
            artifacts_dir: std::env::temp_dir().join("webhands-artifacts"),
            launch: LaunchOptions::default(),
            user_agent: "Mozilla/5.0 (compatible; WebHands/0.1)".to_string(),
        }
    }
}

impl BrowserToolConfig {
    /// Viewport used when resize or screenshot omit a dimension.
    pub fn viewport(&self) -> (u32, u32) {
        self.launch.viewport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = BrowserToolConfig::default();
        assert_eq!(config.default_engine, EngineMode::Auto);
        assert!(config.allow_fallback);
        assert_eq!(config.snapshot_retries, 1);
        assert_eq!(config.buffers.console, 400);
        assert_eq!(config.buffers.dialogs, 80);
        assert_eq!(config.limits.max_links, 80);
        assert_eq!(config.viewport(), (1280, 720));
        assert!(config.artifacts_dir.ends_with("webhands-artifacts"));
    }
}
