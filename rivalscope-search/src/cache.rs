//! In-memory TTL cache in front of a search provider.
//!
//! Caches successful hit lists keyed by (provider id, normalised query,
//! limit). Uses [`moka`] for async-friendly caching with configurable
//! TTL and automatic eviction. Failures are never cached.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use crate::engine::SearchProvider;
use crate::error::SearchError;
use crate::types::{ProviderTier, RawHit};

/// Default maximum number of cached hit lists per provider.
pub const DEFAULT_CACHE_ENTRIES: u64 = 1_000;

/// Composite cache key: provider + normalised query + limit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    provider: String,
    /// Lowercased query with whitespace collapsed.
    query: String,
    limit: usize,
}

impl CacheKey {
    /// Build a deterministic cache key.
    ///
    /// `"Cloud   Hosting "` and `"cloud hosting"` produce the same key.
    pub fn new(provider: &str, query: &str, limit: usize) -> Self {
        Self {
            provider: provider.to_owned(),
            query: normalise_query(query),
            limit,
        }
    }
}

fn normalise_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Provider wrapper that serves repeated queries from memory.
///
/// Hits served from the cache have their `query` field rewritten to the
/// text of the current call.
pub struct CachedProvider {
    inner: Arc<dyn SearchProvider>,
    cache: Cache<CacheKey, Vec<RawHit>>,
}

impl CachedProvider {
    /// Wrap `inner` with a cache holding entries for `ttl`.
    pub fn new(inner: Arc<dyn SearchProvider>, ttl: Duration, max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    async fn lookup(&self, key: &CacheKey, query: &str) -> Option<Vec<RawHit>> {
        let mut hits = self.cache.get(key).await?;
        tracing::debug!(provider = self.inner.id(), "search cache hit");
        for hit in &mut hits {
            hit.query = query.to_owned();
        }
        Some(hits)
    }

    /// Number of live entries (approximate, per moka semantics).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl SearchProvider for CachedProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn tier(&self) -> ProviderTier {
        self.inner.tier()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawHit>, SearchError> {
        let key = CacheKey::new(self.inner.id(), query, limit);
        if let Some(hits) = self.lookup(&key, query).await {
            return Ok(hits);
        }
        let hits = self.inner.search(query, limit).await?;
        self.cache.insert(key, hits.clone()).await;
        Ok(hits)
    }

    async fn search_within(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<RawHit>, SearchError> {
        let key = CacheKey::new(self.inner.id(), query, limit);
        if let Some(hits) = self.lookup(&key, query).await {
            return Ok(hits);
        }
        let hits = self.inner.search_within(query, limit, timeout).await?;
        self.cache.insert(key, hits.clone()).await;
        Ok(hits)
    }
}
