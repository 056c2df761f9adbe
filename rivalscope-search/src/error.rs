//! Error types for the rivalscope-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. No API keys or sensitive data appear in
//! error messages.

/// Errors that can occur while querying providers or fetching pages.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// A provider call or page fetch exceeded its time budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An HTTP request failed at the transport or status level.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Failed to parse a provider response or landing page.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid provider or fetcher configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The provider signalled rate limiting (HTTP 429 or a quota refusal).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider's circuit breaker is open; the call was not attempted.
    #[error("circuit open: {0}")]
    CircuitOpen(String),

    /// A fetched page is not an HTML document.
    #[error("not an HTML document: {0}")]
    NotHtml(String),
}

impl SearchError {
    /// Whether a single retry of the same request is worthwhile.
    ///
    /// Transport failures and timeouts are retried; status, parse and
    /// content-type failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Http(_))
    }
}

/// Convenience type alias for rivalscope-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
