//! Fetch engine: plain HTTP plus the micro-parser, no script execution.

mod client;
mod engine;

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::BrowserError;

pub use client::ReqwestFetcher;
pub use engine::{FetchEngine, FetchedPage, PageRequest, MAX_REDIRECTS};
pub(crate) use engine::encode_form;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// One HTTP exchange; redirects are not followed at this level.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
    /// Stop reading the body once it exceeds this many bytes.
    pub max_body: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// At most `max_body + 1` bytes when a cap was requested.
    pub body: Vec<u8>,
    /// Declared or observed body size, which may exceed `body.len()`.
    pub total_bytes: usize,
}

impl HttpResponse {
    /// First header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP capability the fetch engine consumes.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BrowserError>;
}
