//! Tool protocol definitions.
//!
//! A tool is the single entry point an agent runtime calls with a JSON
//! parameter object.

mod context;
mod definition;
mod result;
mod traits;

pub use context::*;
pub use definition::*;
pub use result::*;
pub use traits::*;
