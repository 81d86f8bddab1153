//! Regex-based HTML micro-parser for the fetch engine.
//!
//! Extracts title, links and forms from raw markup without building a DOM,
//! and projects documents into readable text. The live engine never uses
//! this for ref building except as a fallback when its DOM probe returns
//! nothing.

mod parser;
mod text;

pub use parser::{
    decode_entities, document_base, parse_forms, parse_links, parse_title, Form, FormField,
    FormMethod, Link,
};
pub use text::{
    html_to_text, is_html, readable_text, truncate_bytes, truncate_chars, TRUNCATION_MARKER,
};
