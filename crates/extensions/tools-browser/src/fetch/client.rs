//! reqwest-backed [`HttpFetcher`].

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::trace;

use super::{HttpFetcher, HttpMethod, HttpRequest, HttpResponse};
use crate::error::BrowserError;

/// HTTP client with automatic redirects disabled; the engine follows them
/// itself so every hop's cookies are seen.
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(user_agent: &str) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .user_agent(user_agent)
            .build()
            .map_err(|e| BrowserError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BrowserError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(request.url.clone()),
            HttpMethod::Post => self.client.post(request.url.clone()),
        };
        builder = builder.timeout(request.timeout);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let mut response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let declared = response.content_length().map(|n| n as usize);
        // One byte past the cap tells the snapshot builder the body was cut.
        let keep = request.max_body.map_or(usize::MAX, |cap| cap.saturating_add(1));
        let mut body = Vec::new();
        let mut seen = 0usize;
        while let Some(chunk) = response.chunk().await? {
            seen += chunk.len();
            let room = keep.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if seen >= keep {
                break;
            }
        }
        let total_bytes = declared.unwrap_or(seen).max(seen);

        trace!(
            "HTTP {} {} -> {} ({} bytes)",
            request.method.as_str(),
            request.url,
            status,
            total_bytes
        );
        Ok(HttpResponse {
            status,
            headers,
            body,
            total_bytes,
        })
    }
}
