//! Raw-hit grouping by normalised domain.
//!
//! Merges hits that refer to the same site (after domain normalisation)
//! while keeping every contributing provider and hit for traceability.
//! Groups come out in first-seen order so later stages can use the
//! group index as the discovery order.

use std::collections::HashMap;

use crate::types::RawHit;

use super::url_normalize::normalize_domain;

/// All raw hits that normalise to one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainGroup {
    /// Normalised domain (lower-case, `www.` stripped).
    pub domain: String,
    /// Provider ids in first-seen order, without duplicates.
    pub sources: Vec<String>,
    /// Contributing hits in input order, without exact duplicates.
    pub hits: Vec<RawHit>,
}

impl DomainGroup {
    /// The first hit's URL, used as the candidate's landing page.
    pub fn primary_url(&self) -> Option<&str> {
        self.hits.first().map(|h| h.url.as_str())
    }
}

/// Group raw hits by normalised domain.
///
/// Sources and hits are unioned per domain. Hits whose URL has no
/// extractable host are dropped. Grouping the flattened hits of the
/// output again yields the same groups.
pub fn group_by_domain(hits: &[RawHit]) -> Vec<DomainGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<DomainGroup> = Vec::new();
    let mut dropped = 0usize;

    for hit in hits {
        let Some(domain) = normalize_domain(&hit.url) else {
            dropped += 1;
            continue;
        };

        let slot = *index.entry(domain.clone()).or_insert_with(|| {
            groups.push(DomainGroup {
                domain,
                sources: Vec::new(),
                hits: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        if !group.sources.iter().any(|s| s == &hit.source) {
            group.sources.push(hit.source.clone());
        }
        if !group.hits.contains(hit) {
            group.hits.push(hit.clone());
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, "hits without a usable host dropped");
    }
    groups
}
