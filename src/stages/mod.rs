//! The pipeline stages, in execution order.
//!
//! Every stage takes the run's candidate slice and writes only its own
//! fields. Excluded candidates are skipped by all later stages but stay
//! in the slice for the audit trail.

pub mod classify;
pub mod crossval;
pub mod dedupe;
pub mod diversity;
pub mod enrich;
pub mod finalize;
pub mod prefilter;
pub mod query;
pub mod rank;
pub mod semantic;
pub mod validate;

pub use classify::classify_relevance;
pub use crossval::cross_validate;
pub use dedupe::deduplicate;
pub use diversity::{enforce_diversity, infer_category};
pub use enrich::enrich;
pub use finalize::{confidence_score, final_filter};
pub use prefilter::{PreFilter, prefilter};
pub use query::{QueryPlan, QueryStrategy, SearchQuery, generate_queries};
pub use rank::rank;
pub use semantic::score_similarity;
pub use validate::validate_content;

/// Whether `haystack` contains `term` delimited by non-alphanumeric
/// characters (or the text edges). Both are compared case-insensitively.
pub(crate) fn contains_term(haystack: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(&term) {
        let begin = start + pos;
        let end = begin + term.len();
        let before_ok = haystack[..begin]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = begin + haystack[begin..].chars().next().map_or(1, char::len_utf8);
    }
    false
}
