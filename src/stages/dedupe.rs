//! Candidate construction from domain groups.

use rivalscope_search::ProviderTier;
use rivalscope_search::orchestrator::{DomainGroup, is_same_site};

use crate::candidate::Candidate;

/// Build candidates from domain groups, dropping the client's own site.
///
/// Groups whose domain is the client domain or one of its sub-domains are
/// removed before any candidate exists, so they never reach the audit set.
/// Discovery order is assigned after the removal.
pub fn deduplicate<F>(groups: Vec<DomainGroup>, client_domain: &str, tier_of: F) -> Vec<Candidate>
where
    F: Fn(&str) -> Option<ProviderTier>,
{
    let before = groups.len();
    let candidates: Vec<Candidate> = groups
        .into_iter()
        .filter(|g| !is_same_site(&g.domain, client_domain))
        .enumerate()
        .map(|(order, group)| Candidate::from_group(group, order, &tier_of))
        .collect();

    tracing::debug!(
        groups = before,
        candidates = candidates.len(),
        client_removed = before - candidates.len(),
        "deduplicated"
    );
    candidates
}
