//! # WebHands Protocols
//!
//! Contracts shared between the browser tool and whatever hosts it.
//! Contains only interface definitions plus the smallest useful
//! implementations of each.
//!
//! ## Core Traits
//!
//! - [`Tool`] - An executable unit an agent runtime can invoke
//! - [`CredentialStore`] - Credential lookup used by login flows
//! - [`ExternalLauncher`] - Opens a URL in the user's own browser

pub mod credential;
pub mod error;
pub mod launcher;
pub mod tool;
pub mod types;

pub use credential::{AuthMode, Credential, CredentialStore, StaticCredentialStore};
pub use error::{CredentialError, ToolError};
pub use launcher::{ExternalLauncher, SystemLauncher};
pub use tool::{AbortSignal, Tool, ToolContext, ToolDefinition, ToolResult};
pub use types::*;
