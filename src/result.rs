//! Output contract of a discovery run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rivalscope_search::orchestrator::ProviderFailure;

use crate::candidate::{BusinessCategory, Candidate, InclusionStatus, RelevanceLabel};
use crate::stages::query::SearchQuery;

/// Public, serialisable view of a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateView {
    pub domain: String,
    pub url: String,
    pub title: String,
    pub sources: Vec<String>,
    pub relevance_score: Option<f64>,
    pub relevance_label: Option<RelevanceLabel>,
    pub confidence_score: Option<f64>,
    pub combined_score: Option<f64>,
    pub semantic_similarity: Option<f64>,
    pub business_category: Option<BusinessCategory>,
    pub inclusion_status: InclusionStatus,
    pub exclusion_reason: Option<String>,
    pub rationale: String,
    pub inclusion_rule: Option<String>,
}

impl From<&Candidate> for CandidateView {
    fn from(c: &Candidate) -> Self {
        Self {
            domain: c.domain.clone(),
            url: c.url.clone(),
            title: c
                .enriched()
                .map(|e| e.title.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| c.title.clone()),
            sources: c.sources.clone(),
            relevance_score: c.relevance_score.map(round3),
            relevance_label: c.relevance_label,
            confidence_score: c.confidence_score.map(round3),
            combined_score: c.combined_score.map(round3),
            semantic_similarity: c.semantic_similarity.map(round3),
            business_category: c.business_category,
            inclusion_status: c.inclusion_status,
            exclusion_reason: c.exclusion_reason.as_ref().map(ToString::to_string),
            rationale: c.rationale(),
            inclusion_rule: c.inclusion_rule.as_ref().map(ToString::to_string),
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Stage that ran in degraded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedStage {
    /// Relevance classification fell back to the default score.
    Classification,
    /// Similarity defaulted to 0.
    Embedding,
}

/// A stage that completed without its external capability for some candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedEvent {
    pub stage: DegradedStage,
    /// Error or contract violation that triggered the fallback.
    pub detail: String,
    /// Domains that received the fallback value.
    pub domains: Vec<String>,
}

/// Thresholds configured and finally applied by the final filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub strict_combined: f64,
    pub strict_confidence: f64,
    pub applied_combined: f64,
    pub applied_confidence: f64,
    /// Number of relaxation steps taken (0 = strict only).
    pub relaxation_steps: usize,
    /// Diversity-deferred candidates had to be admitted.
    pub deferred_admitted: bool,
    /// Competitors the filter aimed for.
    pub target_minimum: usize,
    /// Upper bound on returned competitors.
    pub limit: usize,
}

impl ThresholdReport {
    /// Report for a run that never reached the final filter.
    pub fn strict_only(min_combined: f64, min_confidence: f64, limit: usize) -> Self {
        Self {
            strict_combined: min_combined,
            strict_confidence: min_confidence,
            applied_combined: min_combined,
            applied_confidence: min_confidence,
            relaxation_steps: 0,
            deferred_admitted: false,
            target_minimum: 0,
            limit,
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub client_domain: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Included candidates, best first.
    pub competitors: Vec<CandidateView>,
    /// Every candidate, included and excluded, in discovery order.
    pub all_candidates: Vec<CandidateView>,
    /// Unique candidate domains found (client excluded).
    pub total_found: usize,
    /// Candidates that survived the prefilter and were scored.
    pub total_evaluated: usize,
    /// Nothing survived the prefilter.
    pub no_candidates_found: bool,
    pub queries_executed: Vec<SearchQuery>,
    pub thresholds: ThresholdReport,
    pub degraded: Vec<DegradedEvent>,
    pub provider_failures: Vec<ProviderFailure>,
}

impl PipelineResult {
    /// Included competitors' domains, best first.
    pub fn competitor_domains(&self) -> Vec<&str> {
        self.competitors.iter().map(|c| c.domain.as_str()).collect()
    }

    /// Look up a candidate view by domain.
    pub fn candidate(&self, domain: &str) -> Option<&CandidateView> {
        self.all_candidates.iter().find(|c| c.domain == domain)
    }
}
