//! # rivalscope-search
//!
//! Search-provider plumbing for rivalscope's competitor discovery.
//!
//! This crate provides everything between a list of query strings and a
//! set of per-domain hit groups, plus landing-page fetching for the
//! enrichment stage.
//!
//! ## Design
//!
//! - [`SearchProvider`] is the capability every provider implements;
//!   DuckDuckGo and Bing are scraped, Brave uses its paid JSON API
//! - [`GuardedProvider`] adds a governor quota and a circuit breaker,
//!   [`CachedProvider`] a moka TTL cache; both wrap any provider
//! - [`orchestrator::search_all`] fans out (query × provider) calls with a
//!   bounded in-flight pool and per-call timeouts
//! - [`orchestrator::group_by_domain`] merges hits per normalised domain
//! - [`PageFetcher`] + [`content::extract_landing_page`] summarise pages
//!
//! ## Security
//!
//! - API keys never appear in `Debug` output or error messages
//! - Query text is logged only at trace level

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod content;
pub mod engine;
pub mod engines;
pub mod error;
pub mod fetch;
pub mod guard;
pub mod http;
pub mod orchestrator;
pub mod types;

use std::time::Duration;

pub use cache::CachedProvider;
pub use circuit_breaker::{CircuitBreakerConfig, CircuitState};
pub use config::SearchConfig;
pub use engine::SearchProvider;
pub use error::{Result, SearchError};
pub use fetch::{FetchedPage, HttpPageFetcher, PageFetcher};
pub use guard::GuardedProvider;
pub use types::{LandingPage, ProviderTier, RawHit};

/// Fetch a landing page and extract its summary.
///
/// # Errors
///
/// Propagates the fetcher's error: [`SearchError::NotHtml`] for documents,
/// [`SearchError::Timeout`] / [`SearchError::Http`] for unreachable pages.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> rivalscope_search::Result<()> {
/// use std::time::Duration;
/// use rivalscope_search::{HttpPageFetcher, SearchConfig};
///
/// let fetcher = HttpPageFetcher::new(&SearchConfig::default())?;
/// let page = rivalscope_search::fetch_landing_page(&fetcher, "https://example.com", Duration::from_secs(8)).await?;
/// println!("{}: {}", page.title, page.description);
/// # Ok(())
/// # }
/// ```
pub async fn fetch_landing_page(
    fetcher: &dyn PageFetcher,
    url: &str,
    timeout: Duration,
) -> Result<LandingPage> {
    let page = fetcher.fetch(url, timeout).await?;
    Ok(content::extract_landing_page(&page.html, &page.final_url))
}
