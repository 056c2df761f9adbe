//! Error types for the discovery pipeline.

use rivalscope_search::SearchError;

/// Top-level error type for a discovery run.
///
/// Only [`DiscoveryError::InvalidInput`], [`DiscoveryError::Config`] and
/// [`DiscoveryError::Cancelled`] end a run; everything that goes wrong
/// inside a stage is turned into an exclusion reason or a degraded event.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Malformed client profile, rejected before any provider call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// The run was cancelled or its deadline expired.
    #[error("run cancelled: {0}")]
    Cancelled(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Provider or fetcher construction error.
    #[error("search error: {0}")]
    Search(#[from] SearchError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
