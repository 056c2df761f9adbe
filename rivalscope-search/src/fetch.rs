//! Landing-page fetching capability and its reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;

/// Default cap on the number of body bytes kept from a fetched page.
pub const DEFAULT_MAX_BODY_BYTES: usize = 512 * 1024;

/// A fetched HTML document.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// Document body, possibly truncated.
    pub html: String,
    /// HTTP status code of the final response.
    pub status: u16,
    /// `Content-Type` header, when present.
    pub content_type: Option<String>,
    /// URL after redirects.
    pub final_url: String,
}

/// Fetches a single page within a time budget.
///
/// Implementations return [`SearchError::NotHtml`] for non-HTML documents
/// and [`SearchError::Timeout`] when the budget is exceeded.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`, giving up after `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, SearchError>;
}

/// [`PageFetcher`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpPageFetcher {
    /// Build a fetcher with a client configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an invalid config, or
    /// [`SearchError::Http`] if the client cannot be built.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            client: http::build_client(config)?,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Keep at most `max_body_bytes` of each body.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes.max(1);
        self
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, SearchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.5")
            .send()
            .await
            .map_err(|e| http::map_send_error("page fetch failed", &e))?;

        let status = response.status();
        http::check_status("page fetch", status)?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        if let Some(ct) = &content_type {
            if !is_html_content_type(ct) {
                return Err(SearchError::NotHtml(ct.clone()));
            }
        }

        let final_url = response.url().to_string();
        let body = read_capped(response, self.max_body_bytes).await?;

        Ok(FetchedPage {
            html: String::from_utf8_lossy(&body).into_owned(),
            status: status.as_u16(),
            content_type,
            final_url,
        })
    }
}

/// Read at most `cap` body bytes, dropping the connection once the cap is hit.
async fn read_capped(mut response: reqwest::Response, cap: usize) -> Result<Vec<u8>, SearchError> {
    let mut body = Vec::with_capacity(cap.min(64 * 1024));
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| http::map_send_error("page body read failed", &e))?
    {
        let room = cap - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml")
}
