//! Rule-based rejection that runs before any page is fetched.

use regex::{Regex, RegexBuilder};
use url::Url;

use rivalscope_search::RawHit;
use rivalscope_search::orchestrator::is_same_site;

use crate::candidate::{Candidate, ExclusionReason};
use crate::config::FilterConfig;
use crate::error::{DiscoveryError, Result};

/// Compiled PreFilter rules.
#[derive(Debug, Clone)]
pub struct PreFilter {
    document_extensions: Vec<String>,
    disallowed_suffixes: Vec<String>,
    analytics_domains: Vec<String>,
    directory_domains: Vec<String>,
    review_domains: Vec<String>,
    listing_patterns: Vec<Regex>,
}

impl PreFilter {
    /// Compile the rules.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Config`] when a listing pattern is not a valid regex.
    pub fn new(config: &FilterConfig) -> Result<Self> {
        let listing_patterns = config
            .listing_patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| DiscoveryError::Config(format!("invalid listing pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().trim_start_matches("www.").to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };

        Ok(Self {
            document_extensions: config
                .document_extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .collect(),
            disallowed_suffixes: lower(&config.disallowed_suffixes),
            analytics_domains: lower(&config.analytics_domains),
            directory_domains: lower(&config.directory_domains),
            review_domains: lower(&config.review_domains),
            listing_patterns,
        })
    }

    /// First rule the candidate violates, if any.
    ///
    /// Domain rules apply to the domain itself. Document and listing rules
    /// reject only when every hit of the candidate matches, so a domain
    /// that also surfaced through a normal page stays eligible.
    pub fn check(&self, candidate: &Candidate) -> Option<ExclusionReason> {
        let domain = candidate.domain.as_str();

        if let Some(suffix) = self.disallowed_suffixes.iter().find(|s| {
            if s.starts_with('.') {
                domain.ends_with(s.as_str())
            } else {
                is_same_site(domain, s)
            }
        }) {
            return Some(ExclusionReason::DisallowedSuffix {
                suffix: suffix.clone(),
            });
        }
        if matches_any(domain, &self.analytics_domains) {
            return Some(ExclusionReason::AnalyticsPlatform);
        }
        if matches_any(domain, &self.directory_domains) {
            return Some(ExclusionReason::Directory);
        }
        if matches_any(domain, &self.review_domains) {
            return Some(ExclusionReason::ReviewPlatform);
        }

        if !candidate.hits.is_empty() {
            let extensions: Vec<Option<String>> = candidate
                .hits
                .iter()
                .map(|h| self.document_extension(&h.url))
                .collect();
            if extensions.iter().all(Option::is_some) {
                if let Some(Some(extension)) = extensions.into_iter().next() {
                    return Some(ExclusionReason::DocumentUrl { extension });
                }
            }

            let patterns: Vec<Option<&Regex>> =
                candidate.hits.iter().map(|h| self.listing_match(h)).collect();
            if patterns.iter().all(Option::is_some) {
                if let Some(Some(pattern)) = patterns.into_iter().next() {
                    return Some(ExclusionReason::ListingLanguage {
                        pattern: pattern.as_str().to_owned(),
                    });
                }
            }
        }

        None
    }

    fn document_extension(&self, raw_url: &str) -> Option<String> {
        let parsed = Url::parse(raw_url).ok()?;
        let last = parsed.path_segments()?.next_back()?;
        let (_, extension) = last.rsplit_once('.')?;
        let extension = extension.to_lowercase();
        self.document_extensions
            .contains(&extension)
            .then_some(extension)
    }

    fn listing_match(&self, hit: &RawHit) -> Option<&Regex> {
        self.listing_patterns
            .iter()
            .find(|re| re.is_match(&hit.title) || re.is_match(&hit.snippet))
    }
}

fn matches_any(domain: &str, list: &[String]) -> bool {
    list.iter().any(|entry| is_same_site(domain, entry))
}

/// Apply the PreFilter to every pending candidate. Returns the number excluded.
pub fn prefilter(candidates: &mut [Candidate], filter: &PreFilter) -> usize {
    let mut excluded = 0;
    for candidate in candidates.iter_mut().filter(|c| c.is_pending()) {
        if let Some(reason) = filter.check(candidate) {
            candidate.exclude(reason);
            excluded += 1;
        }
    }
    tracing::info!(
        excluded,
        remaining = candidates.iter().filter(|c| c.is_pending()).count(),
        "prefilter complete"
    );
    excluded
}
