//! Brave Search API provider: independent index, paid subscription.
//!
//! Unlike the HTML scrapers this provider speaks Brave's JSON web-search
//! API and needs a subscription token, so it is ranked as premium.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::engine::SearchProvider;
use crate::error::SearchError;
use crate::http;
use crate::types::{ProviderTier, RawHit};

/// Provider identifier recorded on every Brave hit.
pub const BRAVE_ID: &str = "brave";

const DEFAULT_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

/// Brave's API caps `count` at 20.
const MAX_COUNT: usize = 20;

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

/// Brave Search API client.
pub struct BraveProvider {
    client: reqwest::Client,
    config: SearchConfig,
    api_key: String,
    endpoint: String,
}

impl std::fmt::Debug for BraveProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BraveProvider")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl BraveProvider {
    /// Create a provider authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the key is empty or the config is
    /// invalid, or [`SearchError::Http`] if the client cannot be built.
    pub fn new(config: SearchConfig, api_key: impl Into<String>) -> Result<Self, SearchError> {
        config.validate()?;
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SearchError::Config("Brave API key must not be empty".into()));
        }
        let client = http::build_client(&config)?;
        Ok(Self {
            client,
            config,
            api_key,
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
impl SearchProvider for BraveProvider {
    fn id(&self) -> &str {
        BRAVE_ID
    }

    fn tier(&self) -> ProviderTier {
        ProviderTier::Premium
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawHit>, SearchError> {
        tracing::trace!(query, "Brave search");

        let count = limit.min(self.config.max_results).min(MAX_COUNT);
        let count_param = count.to_string();
        let safesearch = if self.config.safe_search { "strict" } else { "off" };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("count", count_param.as_str()),
                ("safesearch", safesearch),
                ("search_lang", self.config.language()),
            ])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| http::map_send_error("Brave request failed", &e))?;
        http::check_status("Brave", response.status())?;

        let body: BraveResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("Brave response decode failed: {e}")))?;

        let hits: Vec<RawHit> = body
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .take(count)
            .enumerate()
            .map(|(rank, r)| RawHit {
                source: BRAVE_ID.to_owned(),
                url: r.url,
                title: r.title,
                snippet: r.description,
                rank,
                query: query.to_owned(),
            })
            .collect();

        tracing::debug!(count = hits.len(), "Brave results parsed");
        Ok(hits)
    }
}
