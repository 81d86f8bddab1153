//! Chrome DevTools Protocol (CDP) backend for the live engine.
//!
//! Launches a local Chrome/Chromium with remote debugging, talks to it over
//! a single WebSocket and exposes it through the [`crate::driver`] traits.
//! Every page is attached with a flattened session so commands and events
//! for all pages share one connection, routed by `sessionId`.

mod chrome;
mod client;
mod error;
mod protocol;
mod session;

pub use chrome::{find_chrome, ChromeBrowser, ChromeContext, ChromeDriver};
pub use client::{CdpClient, BROWSER_SESSION};
pub use error::CdpError;
pub use protocol::*;
pub use session::PageSession;
