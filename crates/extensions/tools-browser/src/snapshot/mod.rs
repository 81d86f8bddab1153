//! Snapshots and addressable element refs.
//!
//! A snapshot is immutable once built. Refs (`e1`, `e2`, ...) are drawn from
//! a per-tab counter, so a ref taken from an older snapshot never matches an
//! entry in a newer one.

mod builder;
mod probe;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::html::Link;

pub use builder::{build_document_snapshot, build_live_snapshot, html_refs, DocumentCapture, LiveCapture};
pub use probe::{classify, refs_from_probe, ProbeRow, PROBE_SCRIPT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Link,
    Form,
    Field,
    Submit,
    Button,
}

/// One addressable element of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRef {
    #[serde(rename = "ref")]
    pub id: String,
    pub kind: RefKind,
    pub role: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_index: Option<usize>,
    /// `get` or `post` of the enclosing form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    /// CSS locator; only present on live-engine refs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl ElementRef {
    pub(crate) fn new(id: String, kind: RefKind, role: &str, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            role: role.to_string(),
            name: name.into(),
            url: None,
            form_index: None,
            form_method: None,
            form_action: None,
            field: None,
            field_type: None,
            selector: None,
        }
    }
}

/// Per-tab ref id allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefCounter(u64);

impl RefCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next_id(&mut self) -> String {
        self.0 += 1;
        format!("e{}", self.0)
    }

    pub fn issued(&self) -> u64 {
        self.0
    }
}

impl Default for RefCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time capture of a tab.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub url: String,
    pub title: String,
    pub status: u16,
    pub ok: bool,
    pub content_type: String,
    pub truncated: bool,
    pub bytes: usize,
    pub text: String,
    pub links: Vec<Link>,
    pub refs: Vec<ElementRef>,
}

impl Snapshot {
    /// Exact, case-sensitive lookup.
    pub fn find_ref(&self, id: &str) -> Option<&ElementRef> {
        self.refs.iter().find(|r| r.id == id)
    }
}

/// Size caps applied while building a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotLimits {
    pub max_chars: usize,
    pub max_bytes: usize,
    pub max_links: usize,
}

impl Default for SnapshotLimits {
    fn default() -> Self {
        Self {
            max_chars: 12_000,
            max_bytes: 2_000_000,
            max_links: 80,
        }
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
