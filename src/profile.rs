//! Client profile: the run's read-only input.

use serde::{Deserialize, Serialize};

use rivalscope_search::orchestrator::normalize_domain;

use crate::error::{DiscoveryError, Result};

/// Smallest accepted `max_results`.
pub const MIN_REQUESTED_RESULTS: usize = 3;
/// Largest accepted `max_results`.
pub const MAX_REQUESTED_RESULTS: usize = 20;
/// `max_results` when the caller omits it.
pub const DEFAULT_REQUESTED_RESULTS: usize = 10;

fn default_max_results() -> usize {
    DEFAULT_REQUESTED_RESULTS
}

/// Description of the client produced by the site-profiling collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientProfile {
    /// The client's own domain; never returned as a competitor.
    pub client_domain: String,
    /// Activity keywords, most important first.
    pub primary_keywords: Vec<String>,
    /// Secondary / semantic keywords, most important first.
    #[serde(default)]
    pub secondary_keywords: Vec<String>,
    /// Who the client sells to.
    #[serde(default)]
    pub target_audience: String,
    /// Editorial tone of the client's site.
    #[serde(default)]
    pub editorial_tone: String,
    /// Requested number of competitors (3–20).
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Region tokens associated with the client.
    #[serde(default)]
    pub regions: Vec<String>,
}

impl ClientProfile {
    /// Minimal profile for a domain and its primary keywords.
    pub fn new(client_domain: impl Into<String>, primary_keywords: Vec<String>) -> Self {
        Self {
            client_domain: client_domain.into(),
            primary_keywords,
            secondary_keywords: Vec::new(),
            target_audience: String::new(),
            editorial_tone: String::new(),
            max_results: DEFAULT_REQUESTED_RESULTS,
            regions: Vec::new(),
        }
    }

    /// Check the profile and return the normalised client domain.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidInput`] when the domain has no
    /// host, no primary keyword is non-blank, or `max_results` is outside
    /// 3–20.
    pub fn validate(&self) -> Result<String> {
        let domain = normalize_domain(&self.client_domain)
            .filter(|d| d.contains('.'))
            .ok_or_else(|| {
                DiscoveryError::InvalidInput(format!(
                    "client_domain is not a valid domain: {:?}",
                    self.client_domain
                ))
            })?;

        if self.primary_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(DiscoveryError::InvalidInput(
                "at least one non-empty primary keyword is required".into(),
            ));
        }

        if !(MIN_REQUESTED_RESULTS..=MAX_REQUESTED_RESULTS).contains(&self.max_results) {
            return Err(DiscoveryError::InvalidInput(format!(
                "max_results must be between {MIN_REQUESTED_RESULTS} and {MAX_REQUESTED_RESULTS}, got {}",
                self.max_results
            )));
        }

        Ok(domain)
    }

    /// Primary then secondary keywords, trimmed, without blanks or
    /// case-insensitive duplicates.
    pub fn keywords(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        let mut out = Vec::new();
        for keyword in self.primary_keywords.iter().chain(&self.secondary_keywords) {
            let trimmed = collapse(keyword);
            if trimmed.is_empty() {
                continue;
            }
            let key = trimmed.to_lowercase();
            if !seen.contains(&key) {
                seen.push(key);
                out.push(trimmed);
            }
        }
        out
    }

    /// One-paragraph description sent to the relevance classifier.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Client site {} active in: {}.",
            self.client_domain.trim(),
            self.keywords().join(", ")
        );
        if !self.target_audience.trim().is_empty() {
            summary.push_str(&format!(" Target audience: {}.", self.target_audience.trim()));
        }
        if !self.editorial_tone.trim().is_empty() {
            summary.push_str(&format!(" Tone: {}.", self.editorial_tone.trim()));
        }
        if !self.regions.is_empty() {
            summary.push_str(&format!(" Regions: {}.", self.regions.join(", ")));
        }
        summary
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
