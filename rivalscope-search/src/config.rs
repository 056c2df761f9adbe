//! HTTP behaviour shared by the built-in providers and the page fetcher.
//!
//! [`SearchConfig`] controls timeouts, result caps, safe search and the
//! User-Agent. The defaults are tuned for reliable, polite scraping.

use crate::error::SearchError;

/// Configuration for provider requests and page fetches.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Maximum number of hits a provider returns per query.
    pub max_results: usize,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Whether to request safe search filtering from providers that support it.
    pub safe_search: bool,
    /// Market / interface language hint sent to providers (e.g. `en-US`).
    pub locale: String,
    /// Custom User-Agent string. If `None`, rotates through a built-in list
    /// of realistic browser User-Agents.
    pub user_agent: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 20,
            timeout_seconds: 10,
            safe_search: true,
            locale: "en-US".to_owned(),
            user_agent: None,
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `max_results` must be greater than 0
    /// - `timeout_seconds` must be greater than 0
    /// - `locale` must not be empty
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_results == 0 {
            return Err(SearchError::Config(
                "max_results must be greater than 0".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.locale.trim().is_empty() {
            return Err(SearchError::Config("locale must not be empty".into()));
        }
        Ok(())
    }

    /// Primary language subtag of [`Self::locale`] (`en` for `en-US`).
    pub fn language(&self) -> &str {
        self.locale.split(['-', '_']).next().unwrap_or("en")
    }
}
