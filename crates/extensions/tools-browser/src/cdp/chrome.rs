//! Chrome process launcher and the CDP-backed [`LiveDriver`].

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::driver::{LaunchOptions, LiveBrowser, LiveContext, LiveDriver, LivePage, PageEvent};
use crate::error::BrowserError;

use super::client::{CdpClient, BROWSER_SESSION};
use super::error::CdpError;
use super::protocol::{CdpResponse, TargetCreated, TargetGone};
use super::session::{PageRegistry, PageSession};

const STARTUP_ATTEMPTS: u32 = 30;
const STARTUP_POLL: Duration = Duration::from_millis(200);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Find Chrome executable path.
pub fn find_chrome() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        let paths = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];
        for path in &paths {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let paths = [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];
        for path in &paths {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let paths = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];
        for path in &paths {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

fn free_port() -> Result<u16, BrowserError> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Launches a local Chrome/Chromium with remote debugging.
pub struct ChromeDriver {
    chrome_path: Option<PathBuf>,
}

impl ChromeDriver {
    /// `chrome_path` overrides auto-detection.
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self { chrome_path }
    }

    fn executable(&self) -> Option<PathBuf> {
        match &self.chrome_path {
            Some(path) if path.exists() => Some(path.clone()),
            Some(_) => None,
            None => find_chrome(),
        }
    }

    fn command(
        executable: &PathBuf,
        port: u16,
        profile_dir: &PathBuf,
        options: &LaunchOptions,
    ) -> Command {
        let mut cmd = Command::new(executable);
        cmd.arg(format!("--remote-debugging-port={}", port))
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg(format!(
                "--window-size={},{}",
                options.viewport.0, options.viewport.1
            ))
            .arg("about:blank")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        if options.headless {
            cmd.arg("--headless=new");
        }
        if let Some(agent) = &options.user_agent {
            cmd.arg(format!("--user-agent={}", agent));
        }
        cmd
    }

    async fn wait_until_listening(endpoint: &str, child: &mut Child) -> Result<(), BrowserError> {
        for _ in 0..STARTUP_ATTEMPTS {
            tokio::time::sleep(STARTUP_POLL).await;
            if let Ok(Some(status)) = child.try_wait() {
                return Err(BrowserError::LaunchFailed(format!(
                    "Chrome exited during startup ({})",
                    status
                )));
            }
            if CdpClient::version(endpoint).await.is_ok() {
                return Ok(());
            }
        }
        Err(BrowserError::LaunchFailed(
            "Chrome failed to start within timeout".to_string(),
        ))
    }
}

#[async_trait]
impl LiveDriver for ChromeDriver {
    fn is_available(&self) -> bool {
        self.executable().is_some()
    }

    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn LiveBrowser>, BrowserError> {
        let executable = self.executable().ok_or_else(|| {
            BrowserError::LiveUnavailable("no Chrome or Chromium executable found".to_string())
        })?;
        let port = match options.debug_port {
            Some(port) => port,
            None => free_port()?,
        };
        let (profile_dir, throwaway) = match &options.profile_dir {
            Some(dir) => (dir.clone(), false),
            None => (
                std::env::temp_dir().join(format!("webhands-profile-{}", uuid::Uuid::new_v4())),
                true,
            ),
        };
        if let Err(e) = std::fs::create_dir_all(&profile_dir) {
            warn!("Failed to create profile directory: {}", e);
        }

        info!(
            "Launching Chrome on port {} with profile at {}",
            port,
            profile_dir.display()
        );
        let mut child = Self::command(&executable, port, &profile_dir, options)
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;
        info!("Chrome launched with PID: {:?}", child.id());

        let endpoint = format!("http://127.0.0.1:{}", port);
        if let Err(e) = Self::wait_until_listening(&endpoint, &mut child).await {
            let _ = child.kill().await;
            if throwaway {
                let _ = std::fs::remove_dir_all(&profile_dir);
            }
            return Err(e);
        }

        let client = Arc::new(CdpClient::connect(&endpoint, COMMAND_TIMEOUT).await?);
        let registry: PageRegistry = Arc::default();
        let browser_events = client.subscribe(BROWSER_SESSION).await;
        client
            .call(
                "Target.setDiscoverTargets",
                Some(json!({"discover": true})),
                None,
            )
            .await?;

        let event_loop = tokio::spawn(ChromeBrowser::event_loop(
            client.clone(),
            registry.clone(),
            browser_events,
            options.viewport,
        ));

        Ok(Arc::new(ChromeBrowser {
            client,
            registry,
            viewport: options.viewport,
            child: tokio::sync::Mutex::new(Some(child)),
            profile_dir: throwaway.then_some(profile_dir),
            event_loop: Mutex::new(Some(event_loop)),
        }))
    }
}

/// A launched Chrome process and its CDP connection.
pub struct ChromeBrowser {
    client: Arc<CdpClient>,
    registry: PageRegistry,
    viewport: (u32, u32),
    child: tokio::sync::Mutex<Option<Child>>,
    profile_dir: Option<PathBuf>,
    event_loop: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ChromeBrowser {
    async fn event_loop(
        client: Arc<CdpClient>,
        registry: PageRegistry,
        mut events: mpsc::UnboundedReceiver<CdpResponse>,
        viewport: (u32, u32),
    ) {
        while let Some(msg) = events.recv().await {
            match msg.method.as_deref() {
                Some("Target.targetCreated") => {
                    let Some(created) = msg.event_params::<TargetCreated>("Target.targetCreated")
                    else {
                        continue;
                    };
                    let info = created.target_info;
                    if info.target_type != "page" {
                        continue;
                    }
                    let Some(opener_id) = info.opener_id else {
                        continue;
                    };
                    let opener = registry
                        .lock()
                        .get(&opener_id)
                        .map(|page| page.events.clone());
                    let Some(opener) = opener else {
                        continue;
                    };
                    debug!("Popup {} opened by {}", info.target_id, opener_id);
                    let client = client.clone();
                    let registry = registry.clone();
                    tokio::spawn(async move {
                        match PageSession::attach(client, &info.target_id, registry, viewport).await {
                            Ok(page) => {
                                let _ = opener.send(PageEvent::Popup(page));
                            }
                            Err(e) => warn!("Failed to attach popup {}: {}", info.target_id, e),
                        }
                    });
                }
                Some(method @ ("Target.targetDestroyed" | "Target.detachedFromTarget")) => {
                    let Some(gone) = msg.event_params::<TargetGone>(method) else {
                        continue;
                    };
                    let mut pages = registry.lock();
                    let target = match (&gone.target_id, &gone.session_id) {
                        (Some(target_id), _) => Some(target_id.clone()),
                        (None, Some(session_id)) => pages
                            .iter()
                            .find(|(_, page)| &page.session_id == session_id)
                            .map(|(id, _)| id.clone()),
                        (None, None) => None,
                    };
                    if let Some(page) = target.and_then(|id| pages.remove(&id)) {
                        page.closed.store(true, Ordering::SeqCst);
                        let _ = page.events.send(PageEvent::Closed);
                    }
                }
                _ => {}
            }
        }
        debug!("Browser event stream ended");
    }
}

#[async_trait]
impl LiveBrowser for ChromeBrowser {
    async fn new_context(&self) -> Result<Arc<dyn LiveContext>, BrowserError> {
        let result = self
            .client
            .call("Target.createBrowserContext", Some(json!({})), None)
            .await?;
        let context_id = result["browserContextId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing browserContextId".to_string()))?
            .to_string();
        debug!("Created browser context {}", context_id);
        Ok(Arc::new(ChromeContext {
            client: self.client.clone(),
            registry: self.registry.clone(),
            context_id,
            viewport: self.viewport,
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if let Some(task) = self.event_loop.lock().take() {
            task.abort();
        }
        if self.client.is_connected() {
            if let Err(e) = self.client.call("Browser.close", None, None).await {
                debug!("Browser.close failed: {}", e);
            }
        }
        if let Some(mut child) = self.child.lock().await.take() {
            info!("Shutting down Chrome...");
            let _ = child.kill().await;
        }
        if let Some(dir) = &self.profile_dir {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                debug!("Failed to remove profile {}: {}", dir.display(), e);
            }
        }
        Ok(())
    }
}

/// An isolated browser context (`Target.createBrowserContext`).
pub struct ChromeContext {
    client: Arc<CdpClient>,
    registry: PageRegistry,
    context_id: String,
    viewport: (u32, u32),
}

#[async_trait]
impl LiveContext for ChromeContext {
    async fn new_page(&self) -> Result<Arc<dyn LivePage>, BrowserError> {
        let result = self
            .client
            .call(
                "Target.createTarget",
                Some(json!({
                    "url": "about:blank",
                    "browserContextId": self.context_id,
                })),
                None,
            )
            .await?;
        let target_id = result["targetId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing targetId".to_string()))?;
        let page = PageSession::attach(
            self.client.clone(),
            target_id,
            self.registry.clone(),
            self.viewport,
        )
        .await?;
        Ok(page)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.client
            .call(
                "Target.disposeBrowserContext",
                Some(json!({"browserContextId": self.context_id})),
                None,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_override_is_unavailable() {
        let driver = ChromeDriver::new(Some(PathBuf::from("/nonexistent/chrome-binary")));
        assert!(!driver.is_available());
    }

    #[tokio::test]
    async fn test_launch_without_executable_is_unavailable() {
        let driver = ChromeDriver::new(Some(PathBuf::from("/nonexistent/chrome-binary")));
        let err = match driver.launch(&LaunchOptions::default()).await {
            Err(e) => e,
            Ok(_) => panic!("launch should fail"),
        };
        assert!(matches!(err, BrowserError::LiveUnavailable(_)));
    }

    #[test]
    fn test_free_port_is_nonzero() {
        assert!(free_port().unwrap() > 0);
    }
}
