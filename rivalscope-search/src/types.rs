//! Core types for raw search hits, provider tiers and landing pages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single result returned by one provider for one query.
///
/// Raw hits are ephemeral: they exist until domain grouping merges them
/// into candidates, which keep them only for traceability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    /// Identifier of the provider that returned this hit.
    pub source: String,
    /// The result URL as reported by the provider.
    pub url: String,
    /// Title of the result page.
    pub title: String,
    /// A text snippet summarising the page content.
    pub snippet: String,
    /// 0-based position in the provider's result list.
    pub rank: usize,
    /// The query text that produced this hit.
    pub query: String,
}

/// Commercial tier of a provider, used to break ranking ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    /// Paid API with curated results.
    Premium,
    /// Free / scraped results.
    Free,
}

impl ProviderTier {
    /// Returns the human-readable name of this tier.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Premium => "premium",
            Self::Free => "free",
        }
    }

    /// Weight applied to this tier's positions when scoring raw rank.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Premium => 1.2,
            Self::Free => 1.0,
        }
    }

    /// Sort key: lower sorts first (premium before free).
    pub fn priority(&self) -> u8 {
        match self {
            Self::Premium => 0,
            Self::Free => 1,
        }
    }
}

impl fmt::Display for ProviderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structured summary extracted from a fetched landing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandingPage {
    /// The URL that was fetched.
    pub url: String,
    /// The page title extracted from HTML.
    pub title: String,
    /// Meta description, or the first substantial paragraph.
    pub description: String,
    /// Short phrases listed under a services-style heading.
    pub service_phrases: Vec<String>,
    /// Cleaned, readable text with boilerplate stripped.
    pub text: String,
    /// Lower-cased link labels and anchors (contact, quote, portfolio...).
    pub link_labels: Vec<String>,
    /// `og:type` meta value when present.
    pub og_type: Option<String>,
    /// Number of words in the extracted text.
    pub word_count: usize,
}
