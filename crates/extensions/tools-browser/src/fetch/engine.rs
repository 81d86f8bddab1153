//! Page loads with manual redirects and per-tab cookies.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use super::{HttpFetcher, HttpMethod, HttpRequest};
use crate::cookies::CookieJar;
use crate::error::BrowserError;
use crate::tabs::validate_url;

pub const MAX_REDIRECTS: usize = 10;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// A page-level request: GET, or POST with a urlencoded form body.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub form: Option<Vec<(String, String)>>,
    pub referer: Option<String>,
    pub max_body: Option<usize>,
}

impl PageRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            form: None,
            referer: None,
            max_body: None,
        }
    }

    pub fn post_form(url: Url, form: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Post,
            url,
            form: Some(form),
            referer: None,
            max_body: None,
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Cap how much of each response body is read.
    pub fn with_max_body(mut self, max_bytes: usize) -> Self {
        self.max_body = Some(max_bytes);
        self
    }
}

/// Final response after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub total_bytes: usize,
    pub redirects: usize,
}

pub(crate) fn encode_form(pairs: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

pub struct FetchEngine {
    http: Arc<dyn HttpFetcher>,
}

impl FetchEngine {
    pub fn new(http: Arc<dyn HttpFetcher>) -> Self {
        Self { http }
    }

    /// Load one page, following up to [`MAX_REDIRECTS`] redirects. Every
    /// hop's `Set-Cookie` lands in `jar`; 301/302/303 after a POST continue
    /// as GET.
    pub async fn load(
        &self,
        jar: &mut CookieJar,
        request: PageRequest,
        timeout: Duration,
    ) -> Result<FetchedPage, BrowserError> {
        let mut method = request.method;
        let mut url = request.url;
        let mut body = request.form.as_deref().map(encode_form);
        let mut referer = request.referer;
        let max_body = request.max_body;

        for hop in 0..=MAX_REDIRECTS {
            let mut headers = vec![("Accept".to_string(), ACCEPT.to_string())];
            if let Some(cookie) = jar.header_for(&url) {
                headers.push(("Cookie".to_string(), cookie));
            }
            if let Some(r) = &referer {
                headers.push(("Referer".to_string(), r.clone()));
            }
            if body.is_some() {
                headers.push((
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ));
            }

            let response = self
                .http
                .send(HttpRequest {
                    method,
                    url: url.clone(),
                    headers,
                    body: body.clone(),
                    timeout,
                    max_body,
                })
                .await?;

            for header in response.header_values("set-cookie") {
                jar.store(header, &url);
            }

            let is_redirect = matches!(response.status, 301 | 302 | 303 | 307 | 308);
            if let (true, Some(location)) = (is_redirect, response.header("location")) {
                let next = url
                    .join(location.trim())
                    .map_err(|e| BrowserError::NavigationFailed(format!("bad redirect '{}': {}", location, e)))?;
                let next = validate_url(next.as_str())?;
                if matches!(response.status, 301 | 302 | 303) && method == HttpMethod::Post {
                    method = HttpMethod::Get;
                    body = None;
                }
                debug!("Redirect {} -> {} ({})", url, next, response.status);
                referer = Some(url.to_string());
                url = next;
                continue;
            }

            let content_type = response
                .header("content-type")
                .unwrap_or("")
                .to_string();
            return Ok(FetchedPage {
                url,
                status: response.status,
                content_type,
                body: response.body,
                total_bytes: response.total_bytes,
                redirects: hop,
            });
        }

        Err(BrowserError::NavigationFailed(format!(
            "too many redirects (more than {})",
            MAX_REDIRECTS
        )))
    }

    /// [`load`](Self::load) with up to `retries` extra attempts for GETs.
    /// POSTs are never replayed.
    pub async fn load_with_retries(
        &self,
        jar: &mut CookieJar,
        request: PageRequest,
        timeout: Duration,
        retries: u32,
    ) -> Result<FetchedPage, BrowserError> {
        let attempts = if request.method == HttpMethod::Get { retries + 1 } else { 1 };
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.load(jar, request.clone(), timeout).await {
                Ok(page) => return Ok(page),
                Err(e) if e.kind() == crate::error::ErrorKind::Validation => return Err(e),
                Err(e) => {
                    if attempt < attempts {
                        warn!("Fetch of {} failed (attempt {}/{}): {}", request.url, attempt, attempts, e);
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| BrowserError::NavigationFailed(request.url.to_string())))
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
