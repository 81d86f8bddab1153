//! Live engine session state.
//!
//! The browser and its context are started lazily and shared by every tab.
//! Each tab owns at most one page; its console output and dialogs are kept
//! in bounded ring buffers.

mod buffers;
mod manager;

pub use buffers::{BufferCaps, ConsoleEntry, DialogEvent, DialogPlan, PAGE_ERROR_LEVEL};
pub use manager::{LiveSessionManager, PendingPopup};
