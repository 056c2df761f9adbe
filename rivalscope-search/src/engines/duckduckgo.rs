//! DuckDuckGo provider: most scraper-friendly, no API key required.
//!
//! Uses the HTML-only version at `https://html.duckduckgo.com/html/`
//! which requires no JavaScript and is tolerant of automated requests.

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::config::SearchConfig;
use crate::engine::SearchProvider;
use crate::error::SearchError;
use crate::http;
use crate::types::RawHit;

/// Provider identifier recorded on every DuckDuckGo hit.
pub const DUCKDUCKGO_ID: &str = "duckduckgo";

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo HTML search scraper.
///
/// Free tier. Uses a POST request to the HTML-only endpoint.
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    config: SearchConfig,
    endpoint: String,
}

impl DuckDuckGoProvider {
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

    /// Extract the actual URL from DuckDuckGo's redirect wrapper.
    ///
    /// DDG wraps URLs like: `//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&rut=...`
    /// We parse out the `uddg` query parameter and URL-decode it.
    fn extract_url(href: &str) -> Option<String> {
        let full_href = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };

        let parsed = Url::parse(&full_href).ok()?;

        if parsed.host_str() == Some("duckduckgo.com") && parsed.path().starts_with("/l/") {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, value)| value.into_owned())
        } else {
            Some(full_href)
        }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn id(&self) -> &str {
        DUCKDUCKGO_ID
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawHit>, SearchError> {
        tracing::trace!(query, "DuckDuckGo search");

        let mut params = vec![("q", query)];
        if self.config.safe_search {
            params.push(("kp", "1"));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .form(&params)
            .header("Accept-Language", format!("{},en;q=0.8", self.config.locale))
            .send()
            .await
            .map_err(|e| http::map_send_error("DuckDuckGo request failed", &e))?;
        http::check_status("DuckDuckGo", response.status())?;

        let html = response
            .text()
            .await
            .map_err(|e| http::map_send_error("DuckDuckGo response read failed", &e))?;

        tracing::trace!(bytes = html.len(), "DuckDuckGo response received");

        parse_duckduckgo_html(&html, query, limit.min(self.config.max_results))
    }
}

/// Parse DuckDuckGo HTML response into raw hits.
///
/// Extracted as a separate function for testability with mock HTML.
pub(crate) fn parse_duckduckgo_html(
    html: &str,
    query: &str,
    max_results: usize,
) -> Result<Vec<RawHit>, SearchError> {
    let document = Html::parse_document(html);

    let result_sel = Selector::parse(
        ".result.results_links.results_links_deep:not(.result--ad), .web-result:not(.result--ad)",
    )
    .map_err(|e| SearchError::Parse(format!("invalid result selector: {e:?}")))?;
    let title_sel = Selector::parse(".result__a")
        .map_err(|e| SearchError::Parse(format!("invalid title selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".result__snippet")
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

        let Some(url) = title_el
            .value()
            .attr("href")
            .and_then(DuckDuckGoProvider::extract_url)
        else {
            continue;
        };

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        hits.push(RawHit {
            source: DUCKDUCKGO_ID.to_owned(),
            url,
            title,
            snippet,
            rank: hits.len(),
            query: query.to_owned(),
        });
    }

    tracing::debug!(count = hits.len(), "DuckDuckGo results parsed");
    Ok(hits)
}
