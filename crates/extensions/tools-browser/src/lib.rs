//! Dual-engine browser automation for WebHands.
//!
//! One tool, `browser`, drives web pages through two interchangeable
//! engines behind a single action contract:
//!
//! ```text
//!                    ┌────────────────────┐
//!   execute(params)  │   BrowserTool      │   tabs, history, refs
//!  ────────────────► │   (dispatcher)     │ ◄──────────────────────
//!                    └─────────┬──────────┘
//!                 engine policy│
//!            ┌─────────────────┴─────────────────┐
//!            ▼                                   ▼
//!   ┌─────────────────┐                ┌───────────────────┐
//!   │  fetch engine   │                │   live engine     │
//!   │  HTTP + regex   │                │  headless Chrome  │
//!   │  micro-parser   │                │  over CDP         │
//!   └─────────────────┘                └───────────────────┘
//! ```
//!
//! Both engines produce the same [`Snapshot`]: readable text, links and an
//! ordered list of element refs (`e1`, `e2`, ...) that follow-up actions
//! address. Refs are only valid against the snapshot that issued them.
//!
//! ## Engines
//!
//! - `fetch` loads pages over plain HTTP, follows redirects by hand and
//!   keeps a per-tab cookie jar. No script runs.
//! - `live` launches headless Chrome lazily on first use, one page per tab,
//!   and records console output, dialogs and popups per tab.
//!
//! `engine = "auto"` prefers live for new tabs and never silently upgrades
//! an existing fetch tab. A live navigation that times out or fails to
//! launch is retried on fetch unless `allowFallback` is false.
//!
//! ## Actions
//!
//! - Navigation: `open`, `navigate`, `reload`, `back`, `forward`, `snapshot`
//! - Interaction: `click`, `fill`, `submit`, `hover`, `press`, `select`,
//!   `drag`, `evaluate`, `upload`, `scroll`, `wait`, `act`
//! - Page: `resize`, `screenshot`, `pdf`, `console`, `dialog`
//! - Credentials: `login`, `mfa`
//! - Tabs: `tabs`, `focus`, `close`, `reset`, `open_external`

pub mod action;
pub mod cdp;
mod config;
pub mod cookies;
pub mod driver;
pub mod engine;
mod error;
pub mod fetch;
pub mod html;
pub mod live;
pub mod params;
pub mod snapshot;
pub mod tabs;
mod tools;

pub use action::{ActionRequest, BrowserAction};
pub use cdp::{find_chrome, CdpClient, CdpError, ChromeDriver, PageSession};
pub use config::BrowserToolConfig;
pub use cookies::{Cookie, CookieJar};
pub use driver::{LaunchOptions, LiveBrowser, LiveContext, LiveDriver, LivePage, PageEvent};
pub use engine::{Engine, EngineMode};
pub use error::{BrowserError, ErrorKind};
pub use fetch::{HttpFetcher, HttpMethod, HttpRequest, HttpResponse, ReqwestFetcher};
pub use live::{BufferCaps, ConsoleEntry, DialogEvent, DialogPlan};
pub use snapshot::{ElementRef, RefKind, Snapshot, SnapshotLimits};
pub use tools::{service_candidates, BrowserTool, TOOL_ID};
