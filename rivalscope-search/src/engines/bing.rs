//! Bing provider: free fallback with Microsoft's index.

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::config::SearchConfig;
use crate::engine::SearchProvider;
use crate::error::SearchError;
use crate::http;
use crate::types::RawHit;

/// Provider identifier recorded on every Bing hit.
pub const BING_ID: &str = "bing";

const DEFAULT_ENDPOINT: &str = "https://www.bing.com/search";

/// Bing HTML search scraper.
pub struct BingProvider {
    client: reqwest::Client,
    config: SearchConfig,
    endpoint: String,
}

impl BingProvider {
    /// Create a provider with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an invalid config, or
    /// [`SearchError::Http`] if the client cannot be built.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let client = http::build_client(&config)?;
        Ok(Self {
            client,
            config,
            endpoint: DEFAULT_ENDPOINT.to_owned(),
        })
    }

    /// Point the provider at a different endpoint (used by tests).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for BingProvider {
    fn id(&self) -> &str {
        BING_ID
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawHit>, SearchError> {
        tracing::trace!(query, "Bing search");

        let safesearch_val = if self.config.safe_search { "Strict" } else { "Off" };
        let count = limit.min(self.config.max_results).to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("setlang", self.config.language()),
                ("safeSearch", safesearch_val),
                ("count", count.as_str()),
            ])
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", format!("{},en;q=0.8", self.config.locale))
            .send()
            .await
            .map_err(|e| http::map_send_error("Bing request failed", &e))?;
        http::check_status("Bing", response.status())?;

        let html = response
            .text()
            .await
            .map_err(|e| http::map_send_error("Bing response read failed", &e))?;

        tracing::trace!(bytes = html.len(), "Bing response received");

        parse_bing_html(&html, query, limit.min(self.config.max_results))
    }
}

/// Parse Bing HTML response into raw hits.
///
/// Links that stay on bing.com (answer cards, internal redirects) are skipped.
fn parse_bing_html(html: &str, query: &str, max_results: usize) -> Result<Vec<RawHit>, SearchError> {
    let document = Html::parse_document(html);

    // Bing uses li.b_algo containers for organic search results
    let result_sel = Selector::parse("li.b_algo")
        .map_err(|e| SearchError::Parse(format!("invalid result selector: {e:?}")))?;
    let title_sel = Selector::parse("h2")
        .map_err(|e| SearchError::Parse(format!("invalid title selector: {e:?}")))?;
    let link_sel = Selector::parse("a")
        .map_err(|e| SearchError::Parse(format!("invalid link selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".b_caption p, .b_lineclamp2")
        .map_err(|e| SearchError::Parse(format!("invalid snippet selector: {e:?}")))?;

    let mut hits = Vec::new();

    for element in document.select(&result_sel) {
        if hits.len() >= max_results {
            break;
        }

        let Some(title_el) = element.select(&title_sel).next() else {
            continue;
        };

        let title = title_el.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }

        let url = title_el
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);

        let url = match url {
            Some(u) if u.starts_with("http") && !u.contains("bing.com/") => u,
            _ => continue,
        };

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        hits.push(RawHit {
            source: BING_ID.to_owned(),
            url,
            title,
            snippet,
            rank: hits.len(),
            query: query.to_owned(),
        });
    }

    tracing::debug!(count = hits.len(), "Bing results parsed");
    Ok(hits)
}
