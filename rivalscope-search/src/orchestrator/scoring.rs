//! Weighted scoring with position-decay for raw hits.
//!
//! Assigns each hit a score based on:
//! - Provider tier weight (from [`ProviderTier::weight`])
//! - Position decay (earlier results score higher)
//!
//! Formula: `score = tier_weight * position_decay`
//! where `position_decay = 1.0 / (1.0 + position_index * 0.1)`

use crate::types::{ProviderTier, RawHit};

/// Position decay for a 0-based rank.
///
/// - Rank 0 gets decay factor 1.0
/// - Rank 9 gets decay factor ~0.53
pub fn position_decay(rank: usize) -> f64 {
    1.0 / (1.0 + rank as f64 * 0.1)
}

/// Score of a single hit returned by a provider of the given tier.
pub fn hit_score(tier: ProviderTier, rank: usize) -> f64 {
    tier.weight() * position_decay(rank)
}

/// Best score over a group's hits, with the best tier that produced any hit.
///
/// `tier_of` resolves a provider id to its tier; unknown ids count as free.
/// Returns `(0.0, Free)` for an empty slice.
pub fn best_source_score<F>(hits: &[RawHit], tier_of: F) -> (f64, ProviderTier)
where
    F: Fn(&str) -> Option<ProviderTier>,
{
    let mut best_score = 0.0_f64;
    let mut best_tier = ProviderTier::Free;

    for hit in hits {
        let tier = tier_of(&hit.source).unwrap_or(ProviderTier::Free);
        best_score = best_score.max(hit_score(tier, hit.rank));
        if tier.priority() < best_tier.priority() {
            best_tier = tier;
        }
    }

    (best_score, best_tier)
}
