//! Opening URLs in the user's own, visible browser.

use std::process::{Command, Stdio};

use crate::error::ToolError;

/// Hands a URL to a browser the user can see.
pub trait ExternalLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), ToolError>;
}

/// Uses the platform opener (`open`, `xdg-open`, `start`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    fn command(url: &str) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
    }
}

impl ExternalLauncher for SystemLauncher {
    fn open(&self, url: &str) -> Result<(), ToolError> {
        Self::command(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to launch external browser: {}", e)))
    }
}
