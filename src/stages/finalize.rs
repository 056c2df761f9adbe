//! Confidence scoring and the final inclusion filter.
//!
//! The filter runs in up to three phases over the ranked candidates:
//!
//! 1. strict thresholds, non-deferred candidates only;
//! 2. if fewer than the target minimum passed, both thresholds drop by
//!    `relax_step` per step until the minimum is met or both floors are
//!    reached;
//! 3. if the minimum is still missed, diversity-deferred candidates that
//!    meet the final thresholds are admitted.
//!
//! Every admission records its [`InclusionRule`]; every candidate left
//! pending afterwards is excluded with the reason that kept it out.

use crate::candidate::{BusinessCategory, Candidate, ExclusionReason, InclusionRule};
use crate::config::FinalFilterConfig;
use crate::result::ThresholdReport;

const EPSILON: f64 = 1e-9;

/// Signal-agreement confidence in [0, 1].
///
/// A weighted blend of relevance (0.40), cross-validation (0.20),
/// similarity (0.25) and content validation (0.15), multiplied by
/// `0.7 + 0.1 · agreeing`, where `agreeing` counts the signals that
/// independently support the candidate: relevance ≥ 0.6, found by two
/// sources, similarity ≥ 0.5, content validated.
pub fn confidence_score(candidate: &Candidate) -> f64 {
    let relevance = candidate.relevance_score.unwrap_or(0.0);
    let similarity = candidate.semantic_similarity.unwrap_or(0.0);
    let cross = f64::from(u8::from(candidate.cross_validated));
    let validated = f64::from(u8::from(candidate.content_validated));

    let base = 0.40 * relevance + 0.20 * cross + 0.25 * similarity + 0.15 * validated;
    let agreeing = [
        relevance >= 0.6,
        candidate.cross_validated,
        similarity >= 0.5,
        candidate.content_validated,
    ]
    .into_iter()
    .filter(|&s| s)
    .count();

    (base * (0.7 + 0.1 * agreeing as f64)).clamp(0.0, 1.0)
}

fn passes(candidate: &Candidate, min_combined: f64, min_confidence: f64) -> bool {
    candidate.combined_score.unwrap_or(0.0) + EPSILON >= min_combined
        && candidate.confidence_score.unwrap_or(0.0) + EPSILON >= min_confidence
}

/// Apply the final filter to the ranked candidates.
///
/// `ranking` holds pending candidate indices best first, as returned by
/// [`crate::stages::rank`]. Returns the included indices in ranking order
/// and the thresholds report.
pub fn final_filter(
    candidates: &mut [Candidate],
    ranking: &[usize],
    max_results: usize,
    config: &FinalFilterConfig,
) -> (Vec<usize>, ThresholdReport) {
    for &i in ranking {
        let confidence = confidence_score(&candidates[i]);
        candidates[i].confidence_score = Some(confidence);
    }

    let limit = max_results.min(config.hard_cap).max(1);
    let target = config.min_results.min(limit);
    let mut report = ThresholdReport {
        strict_combined: config.min_combined,
        strict_confidence: config.min_confidence,
        applied_combined: config.min_combined,
        applied_confidence: config.min_confidence,
        relaxation_steps: 0,
        deferred_admitted: false,
        target_minimum: target,
        limit,
    };

    let mut included: Vec<usize> = Vec::new();

    // Strict.
    for &i in ranking {
        if included.len() == limit {
            break;
        }
        let c = &mut candidates[i];
        if !c.diversity_deferred && passes(c, config.min_combined, config.min_confidence) {
            c.include(InclusionRule::Strict {
                min_combined: config.min_combined,
                min_confidence: config.min_confidence,
            });
            included.push(i);
        }
    }

    // Relaxation.
    let mut step = 0usize;
    let (mut min_combined, mut min_confidence) = (config.min_combined, config.min_confidence);
    while included.len() < target
        && (min_combined > config.floor_combined + EPSILON
            || min_confidence > config.floor_confidence + EPSILON)
    {
        step += 1;
        min_combined = (config.min_combined - step as f64 * config.relax_step).max(config.floor_combined);
        min_confidence =
            (config.min_confidence - step as f64 * config.relax_step).max(config.floor_confidence);
        tracing::info!(
            step,
            min_combined,
            min_confidence,
            included = included.len(),
            target,
            "relaxing final thresholds"
        );

        for &i in ranking {
            if included.len() == target {
                break;
            }
            let c = &mut candidates[i];
            if c.is_pending() && !c.diversity_deferred && passes(c, min_combined, min_confidence) {
                tracing::info!(
                    domain = %c.domain,
                    step,
                    combined = c.combined_score.unwrap_or(0.0),
                    confidence = c.confidence_score.unwrap_or(0.0),
                    "admitted under relaxed thresholds"
                );
                c.include(InclusionRule::Relaxed {
                    step,
                    min_combined,
                    min_confidence,
                });
                included.push(i);
            }
        }
    }
    report.relaxation_steps = step;
    report.applied_combined = min_combined;
    report.applied_confidence = min_confidence;

    // Deferred candidates, only once relaxation is exhausted.
    if included.len() < target {
        for &i in ranking {
            if included.len() == target {
                break;
            }
            let c = &mut candidates[i];
            if c.is_pending() && c.diversity_deferred && passes(c, min_combined, min_confidence) {
                tracing::info!(
                    domain = %c.domain,
                    category = ?c.business_category,
                    "diversity-deferred candidate admitted to meet the minimum"
                );
                c.include(InclusionRule::DiversityOverride {
                    min_combined,
                    min_confidence,
                });
                included.push(i);
                report.deferred_admitted = true;
            }
        }
    }

    let selected = included.len();
    for &i in ranking {
        let c = &mut candidates[i];
        if !c.is_pending() {
            continue;
        }
        let qualifies = passes(c, min_combined, min_confidence);
        let reason = if qualifies && c.diversity_deferred {
            ExclusionReason::DiversityCap {
                category: c.business_category.unwrap_or(BusinessCategory::Other),
            }
        } else if qualifies {
            ExclusionReason::ResultLimit { limit: selected }
        } else {
            ExclusionReason::BelowThreshold {
                combined: c.combined_score.unwrap_or(0.0),
                confidence: c.confidence_score.unwrap_or(0.0),
                min_combined,
                min_confidence,
            }
        };
        c.exclude(reason);
    }

    included.sort_by_key(|&i| ranking.iter().position(|&r| r == i).unwrap_or(usize::MAX));

    tracing::info!(
        included = included.len(),
        target,
        limit,
        relaxation_steps = report.relaxation_steps,
        deferred_admitted = report.deferred_admitted,
        "final filter complete"
    );
    (included, report)
}
