//! Business-signal validation and media exclusion.

use rivalscope_search::orchestrator::is_same_site;

use crate::candidate::{Candidate, ExclusionReason};
use crate::config::ValidationConfig;
use crate::stages::contains_term;

/// Media signal for a candidate, if it looks like a news or media outlet.
pub fn media_signal(candidate: &Candidate, config: &ValidationConfig) -> Option<String> {
    let domain = candidate.domain.as_str();
    if let Some(known) = config
        .media_domains
        .iter()
        .find(|m| is_same_site(domain, &m.trim().to_lowercase()))
    {
        return Some(format!("known outlet {known}"));
    }

    // Every label but the public suffix, split on hyphens too.
    let labels: Vec<&str> = domain.split('.').collect();
    let pieces = labels[..labels.len().saturating_sub(1)]
        .iter()
        .flat_map(|label| label.split('-'));
    for piece in pieces {
        if let Some(token) = config.media_domain_tokens.iter().find(|token| {
            let token = token.as_str();
            piece == token || (token.len() >= 4 && piece.ends_with(token))
        }) {
            return Some(format!("domain token {token}"));
        }
    }

    let text = candidate.searchable_text();
    config
        .media_phrases
        .iter()
        .find(|phrase| contains_term(&text, phrase))
        .map(|phrase| format!("phrase \"{phrase}\""))
}

/// Whether the candidate shows a business keyword or an active-business
/// indicator.
///
/// Enriched candidates use their extracted keywords, services and
/// indicators. Title and snippet text is checked against `vocabulary` for
/// every candidate, so one whose page could not be fetched can still pass.
pub fn has_business_signal(candidate: &Candidate, vocabulary: &[String]) -> bool {
    if let Some(e) = candidate.enriched() {
        if !e.keywords.is_empty() || !e.services.is_empty() || !e.indicators.is_empty() {
            return true;
        }
    }
    let hit_text = candidate.hit_text();
    vocabulary.iter().any(|term| contains_term(&hit_text, term))
}

/// Exclude media outlets and candidates without business signals. Sets
/// `content_validated` on the survivors and returns the number excluded.
pub fn validate_content(
    candidates: &mut [Candidate],
    config: &ValidationConfig,
    vocabulary: &[String],
) -> usize {
    let mut excluded = 0;
    for candidate in candidates.iter_mut().filter(|c| c.is_pending()) {
        if let Some(signal) = media_signal(candidate, config) {
            candidate.exclude(ExclusionReason::MediaOutlet { signal });
            excluded += 1;
        } else if !has_business_signal(candidate, vocabulary) {
            candidate.exclude(ExclusionReason::NoBusinessSignal);
            excluded += 1;
        } else {
            candidate.content_validated = true;
        }
    }
    tracing::info!(
        excluded,
        validated = candidates.iter().filter(|c| c.content_validated).count(),
        "content validation complete"
    );
    excluded
}
