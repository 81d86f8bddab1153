//! CDP page session for interacting with a single page.

mod core;
mod dom;
mod input;
mod js;
mod navigation;
mod page;

pub use self::core::PageSession;
pub(crate) use self::core::PageRegistry;
