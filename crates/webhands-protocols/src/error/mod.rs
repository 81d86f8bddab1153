//! Error types for the WebHands protocol layer.

mod credential;
mod tool;

pub use credential::*;
pub use tool::*;
