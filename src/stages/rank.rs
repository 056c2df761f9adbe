//! Weighted combined score and ordering.

use std::cmp::Ordering;

use crate::candidate::Candidate;
use crate::config::{QueryConfig, RankingWeights};
use crate::profile::ClientProfile;
use crate::stages::contains_term;

/// Region tokens associated with the client, lower-cased.
///
/// Explicit profile regions win; otherwise known regions mentioned in the
/// keywords or target audience; otherwise the configured market regions.
pub fn client_regions(
    profile: &ClientProfile,
    known_regions: &[String],
    queries: &QueryConfig,
) -> Vec<String> {
    let normalise = |items: &[String]| -> Vec<String> {
        items
            .iter()
            .map(|r| r.trim().to_lowercase())
            .filter(|r| !r.is_empty())
            .collect()
    };

    let explicit = normalise(&profile.regions);
    if !explicit.is_empty() {
        return explicit;
    }

    let described = format!("{} {}", profile.keywords().join(" "), profile.target_audience);
    let mentioned: Vec<String> = normalise(known_regions)
        .into_iter()
        .filter(|region| contains_term(&described, region))
        .collect();
    if !mentioned.is_empty() {
        return mentioned;
    }

    normalise(&queries.market_regions)
}

/// Whether one of the candidate's region tokens matches a client region.
pub fn geo_match(candidate: &Candidate, regions: &[String]) -> bool {
    if regions.is_empty() {
        return false;
    }
    if let Some(e) = candidate.enriched() {
        if e.regions.iter().any(|r| regions.contains(r)) {
            return true;
        }
    }
    let hit_text = candidate.hit_text();
    regions.iter().any(|r| contains_term(&hit_text, r))
}

/// `combined = w.relevance·relevance + w.similarity·similarity
///  + w.cross_validation·[cross] + w.geo·[geo]`, clamped to [0, 1].
pub fn combined_score(candidate: &Candidate, weights: &RankingWeights) -> f64 {
    let relevance = candidate.relevance_score.unwrap_or(0.0);
    let similarity = candidate.semantic_similarity.unwrap_or(0.0);
    let cross = if candidate.cross_validated { 1.0 } else { 0.0 };
    let geo = if candidate.geo_bonus_applied { 1.0 } else { 0.0 };
    (weights.relevance * relevance
        + weights.similarity * similarity
        + weights.cross_validation * cross
        + weights.geo * geo)
        .clamp(0.0, 1.0)
}

/// Score every pending candidate and return their indices best first.
///
/// Ties are broken by provider tier (premium first), then discovery order.
/// Tied candidates that both carry fallback relevance are first ordered by
/// raw source score, best first.
pub fn rank(candidates: &mut [Candidate], regions: &[String], weights: &RankingWeights) -> Vec<usize> {
    let mut ranking: Vec<usize> = Vec::new();
    for (i, candidate) in candidates.iter_mut().enumerate() {
        if !candidate.is_pending() {
            continue;
        }
        candidate.geo_bonus_applied = geo_match(candidate, regions);
        candidate.combined_score = Some(combined_score(candidate, weights));
        ranking.push(i);
    }

    ranking.sort_by(|&a, &b| compare(&candidates[a], &candidates[b]));

    if let Some(&top) = ranking.first() {
        tracing::info!(
            ranked = ranking.len(),
            top = %candidates[top].domain,
            top_score = candidates[top].combined_score.unwrap_or(0.0),
            "ranking complete"
        );
    }
    ranking
}

fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    let sa = a.combined_score.unwrap_or(0.0);
    let sb = b.combined_score.unwrap_or(0.0);
    let fallback_order = if a.relevance_fallback && b.relevance_fallback {
        b.source_score.total_cmp(&a.source_score)
    } else {
        Ordering::Equal
    };
    sb.total_cmp(&sa)
        .then(fallback_order)
        .then(a.best_tier.priority().cmp(&b.best_tier.priority()))
        .then(a.discovery_order.cmp(&b.discovery_order))
}
