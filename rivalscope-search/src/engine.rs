//! Trait definition for pluggable search providers.
//!
//! Each provider (DuckDuckGo, Bing, Brave, or a test double) implements
//! [`SearchProvider`] to offer a uniform `search(query) -> hits` interface.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SearchError;
use crate::types::{ProviderTier, RawHit};

/// A pluggable search provider backend.
///
/// Implementors query a specific search service and return structured
/// [`RawHit`] values. Each provider handles its own:
///
/// - URL construction with query encoding
/// - HTTP request with appropriate headers or API keys
/// - Response parsing
/// - Error mapping for rate limiting, bot detection or parse failures
///
/// Providers are shared read-only across concurrent runs, so all
/// implementations must be `Send + Sync`.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable identifier used as the candidate source (e.g. `duckduckgo`).
    fn id(&self) -> &str;

    /// Commercial tier of this provider; premium hits win ranking ties.
    fn tier(&self) -> ProviderTier {
        ProviderTier::Free
    }

    /// Perform a search and return at most `limit` hits, ranked from 0.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the request fails, the response cannot
    /// be parsed, or the provider is rate-limiting/blocking requests.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawHit>, SearchError>;

    /// Like [`search`](Self::search), but the provider's own work is bounded
    /// by `timeout`.
    ///
    /// Wrappers that queue calls (quotas) override this so that time spent
    /// waiting for a permit does not count against `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Timeout`] when the call exceeds `timeout`, or
    /// whatever [`search`](Self::search) returns.
    async fn search_within(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<RawHit>, SearchError> {
        match tokio::time::timeout(timeout, self.search(query, limit)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(format!(
                "{} exceeded {}ms",
                self.id(),
                timeout.as_millis()
            ))),
        }
    }
}
