//! Multi-source agreement flag.

use crate::candidate::Candidate;

/// Set `cross_validated` on every pending candidate found by two or more
/// providers. Returns the number flagged.
pub fn cross_validate(candidates: &mut [Candidate]) -> usize {
    let mut flagged = 0;
    for candidate in candidates.iter_mut().filter(|c| c.is_pending()) {
        candidate.cross_validated = candidate.sources.len() >= 2;
        if candidate.cross_validated {
            flagged += 1;
        }
    }
    tracing::debug!(flagged, "cross-validation complete");
    flagged
}
