//! Candidate domains and the fields each stage writes on them.
//!
//! A [`Candidate`] is created once, when raw hits are grouped by domain,
//! and then filled in progressively. Each stage owns its own fields; a
//! candidate is never removed from the run, only marked excluded.

use std::fmt;

use serde::{Deserialize, Serialize};

use rivalscope_search::orchestrator::DomainGroup;
use rivalscope_search::orchestrator::scoring::best_source_score;
use rivalscope_search::{ProviderTier, RawHit};

/// Classifier verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceLabel {
    /// Not a competitor.
    None,
    /// Same industry, adjacent offering.
    Indirect,
    /// Same product and market.
    Direct,
}

impl RelevanceLabel {
    /// Label for a score given the direct / indirect lower bounds.
    pub fn from_score(score: f64, direct_threshold: f64, indirect_threshold: f64) -> Self {
        if score >= direct_threshold {
            Self::Direct
        } else if score >= indirect_threshold {
            Self::Indirect
        } else {
            Self::None
        }
    }

    /// Lower-case name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Indirect => "indirect",
            Self::Direct => "direct",
        }
    }
}

/// Inferred business category used for diversity caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessCategory {
    /// Systems / platform integrator.
    Integrator,
    /// Agency (web, marketing, digital).
    Agency,
    /// Consulting firm.
    Consultancy,
    /// Independent professional.
    Freelancer,
    /// Product or SaaS vendor.
    Vendor,
    /// Anything else.
    Other,
}

impl BusinessCategory {
    /// Every category, in matching priority order.
    pub const ALL: [Self; 6] = [
        Self::Integrator,
        Self::Agency,
        Self::Consultancy,
        Self::Freelancer,
        Self::Vendor,
        Self::Other,
    ];

    /// Lower-case name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integrator => "integrator",
            Self::Agency => "agency",
            Self::Consultancy => "consultancy",
            Self::Freelancer => "freelancer",
            Self::Vendor => "vendor",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for BusinessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a candidate stands in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InclusionStatus {
    /// Still under evaluation.
    #[default]
    Pending,
    /// Returned as a competitor.
    Included,
    /// Rejected; see the exclusion reason.
    Excluded,
}

/// Why a candidate was excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Every hit pointed at a downloadable document.
    DocumentUrl {
        /// Extension that matched.
        extension: String,
    },
    /// Government, education or archive suffix.
    DisallowedSuffix {
        /// Suffix that matched.
        suffix: String,
    },
    /// Analytics / SEO-tooling platform.
    AnalyticsPlatform,
    /// Business directory or listing site.
    Directory,
    /// Review aggregator.
    ReviewPlatform,
    /// Titles / snippets use listing language.
    ListingLanguage {
        /// Pattern that matched.
        pattern: String,
    },
    /// News or media outlet.
    MediaOutlet {
        /// Signal that identified the outlet.
        signal: String,
    },
    /// Neither a business keyword nor an active-business indicator.
    NoBusinessSignal,
    /// Below the thresholds finally applied.
    BelowThreshold {
        /// Candidate's combined score.
        combined: f64,
        /// Candidate's confidence.
        confidence: f64,
        /// Combined threshold applied.
        min_combined: f64,
        /// Confidence threshold applied.
        min_confidence: f64,
    },
    /// Deferred by the category cap and never needed.
    DiversityCap {
        /// The over-represented category.
        category: BusinessCategory,
    },
    /// Qualified but cut by the requested maximum.
    ResultLimit {
        /// The limit that applied.
        limit: usize,
    },
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DocumentUrl { extension } => write!(f, "document URL (.{extension})"),
            Self::DisallowedSuffix { suffix } => write!(f, "disallowed domain suffix {suffix}"),
            Self::AnalyticsPlatform => f.write_str("analytics / SEO tooling platform"),
            Self::Directory => f.write_str("business directory or listing site"),
            Self::ReviewPlatform => f.write_str("review aggregator"),
            Self::ListingLanguage { pattern } => write!(f, "listing page (matched {pattern})"),
            Self::MediaOutlet { signal } => write!(f, "news / media outlet ({signal})"),
            Self::NoBusinessSignal => {
                f.write_str("no business keyword or active-business indicator")
            }
            Self::BelowThreshold {
                combined,
                confidence,
                min_combined,
                min_confidence,
            } => write!(
                f,
                "below threshold: combined {combined:.2} (min {min_combined:.2}), confidence {confidence:.2} (min {min_confidence:.2})"
            ),
            Self::DiversityCap { category } => write!(f, "diversity cap reached for {category}"),
            Self::ResultLimit { limit } => write!(f, "outside the top {limit} results"),
        }
    }
}

/// The rule under which a candidate was included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InclusionRule {
    /// Passed the strict thresholds.
    Strict {
        /// Combined threshold.
        min_combined: f64,
        /// Confidence threshold.
        min_confidence: f64,
    },
    /// Passed only after relaxing the thresholds.
    Relaxed {
        /// Relaxation step (1-based) at which the candidate qualified.
        step: usize,
        /// Combined threshold at that step.
        min_combined: f64,
        /// Confidence threshold at that step.
        min_confidence: f64,
    },
    /// A diversity-deferred candidate admitted after full relaxation.
    DiversityOverride {
        /// Combined threshold applied.
        min_combined: f64,
        /// Confidence threshold applied.
        min_confidence: f64,
    },
}

impl InclusionRule {
    /// Thresholds the candidate satisfied.
    pub fn thresholds(&self) -> (f64, f64) {
        match *self {
            Self::Strict {
                min_combined,
                min_confidence,
            }
            | Self::Relaxed {
                min_combined,
                min_confidence,
                ..
            }
            | Self::DiversityOverride {
                min_combined,
                min_confidence,
            } => (min_combined, min_confidence),
        }
    }
}

impl fmt::Display for InclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (c, k) = self.thresholds();
        match self {
            Self::Strict { .. } => write!(f, "strict (combined >= {c:.2}, confidence >= {k:.2})"),
            Self::Relaxed { step, .. } => write!(
                f,
                "relaxed step {step} (combined >= {c:.2}, confidence >= {k:.2})"
            ),
            Self::DiversityOverride { .. } => write!(
                f,
                "diversity override after full relaxation (combined >= {c:.2}, confidence >= {k:.2})"
            ),
        }
    }
}

/// Summary of a candidate's landing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentData {
    /// Page title.
    pub title: String,
    /// Short description.
    pub description: String,
    /// Up to 3 service phrases.
    pub services: Vec<String>,
    /// Up to 5 activity keywords.
    pub keywords: Vec<String>,
    /// Active-business indicators seen on the page.
    pub indicators: Vec<String>,
    /// Region tokens found on the page.
    pub regions: Vec<String>,
    /// Lower-cased page text, kept for content validation.
    #[serde(skip)]
    pub text: String,
}

impl EnrichmentData {
    /// True when nothing useful was extracted.
    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
            && self.services.is_empty()
            && self.keywords.is_empty()
            && self.indicators.is_empty()
    }
}

/// A deduplicated domain under evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    /// Normalised domain.
    pub domain: String,
    /// Landing URL (first hit).
    pub url: String,
    /// Title of the first hit.
    pub title: String,
    /// First non-empty snippet.
    pub snippet: String,
    /// Providers that returned the domain, first-seen order.
    pub sources: Vec<String>,
    /// Originating hits.
    pub hits: Vec<RawHit>,
    /// Position in first-seen order.
    pub discovery_order: usize,
    /// Best tier-weighted, position-decayed hit score.
    pub source_score: f64,
    /// Best provider tier among the sources.
    pub best_tier: ProviderTier,

    /// Landing-page summary (None when not fetched or unusable).
    pub enrichment: Option<EnrichmentData>,

    /// Classifier score in [0, 1].
    pub relevance_score: Option<f64>,
    /// Classifier label.
    pub relevance_label: Option<RelevanceLabel>,
    /// Classifier rationale.
    pub relevance_reason: Option<String>,
    /// The score is the documented fallback, not a classifier verdict.
    pub relevance_fallback: bool,

    /// Cosine similarity to the profile in [0, 1].
    pub semantic_similarity: Option<f64>,
    /// Similarity defaulted to 0 because embedding failed.
    pub similarity_defaulted: bool,

    /// Found by at least two providers.
    pub cross_validated: bool,
    /// Passed content validation.
    pub content_validated: bool,
    /// A page region matched a client region.
    pub geo_bonus_applied: bool,
    /// Weighted ranking score in [0, 1].
    pub combined_score: Option<f64>,
    /// Signal-agreement confidence in [0, 1].
    pub confidence_score: Option<f64>,
    /// Inferred category.
    pub business_category: Option<BusinessCategory>,
    /// Over its category cap; only admitted as a last resort.
    pub diversity_deferred: bool,

    /// Rule that admitted the candidate.
    pub inclusion_rule: Option<InclusionRule>,
    /// Current status.
    pub inclusion_status: InclusionStatus,
    /// Set exactly when excluded.
    pub exclusion_reason: Option<ExclusionReason>,
}

impl Candidate {
    /// Build a pending candidate from a domain group.
    ///
    /// `tier_of` resolves provider ids to tiers for the source score.
    pub fn from_group<F>(group: DomainGroup, discovery_order: usize, tier_of: F) -> Self
    where
        F: Fn(&str) -> Option<ProviderTier>,
    {
        let (source_score, best_tier) = best_source_score(&group.hits, tier_of);
        let url = group.primary_url().unwrap_or_default().to_owned();
        let title = group
            .hits
            .iter()
            .map(|h| h.title.trim())
            .find(|t| !t.is_empty())
            .unwrap_or_default()
            .to_owned();
        let snippet = group
            .hits
            .iter()
            .map(|h| h.snippet.trim())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_owned();

        Self {
            domain: group.domain,
            url,
            title,
            snippet,
            sources: group.sources,
            hits: group.hits,
            discovery_order,
            source_score,
            best_tier,
            enrichment: None,
            relevance_score: None,
            relevance_label: None,
            relevance_reason: None,
            relevance_fallback: false,
            semantic_similarity: None,
            similarity_defaulted: false,
            cross_validated: false,
            content_validated: false,
            geo_bonus_applied: false,
            combined_score: None,
            confidence_score: None,
            business_category: None,
            diversity_deferred: false,
            inclusion_rule: None,
            inclusion_status: InclusionStatus::Pending,
            exclusion_reason: None,
        }
    }

    /// Still under evaluation.
    pub fn is_pending(&self) -> bool {
        self.inclusion_status == InclusionStatus::Pending
    }

    /// Mark excluded. A candidate already decided keeps its first outcome.
    pub fn exclude(&mut self, reason: ExclusionReason) {
        if self.is_pending() {
            tracing::debug!(domain = %self.domain, reason = %reason, "candidate excluded");
            self.inclusion_status = InclusionStatus::Excluded;
            self.exclusion_reason = Some(reason);
        }
    }

    /// Mark included under `rule`.
    pub fn include(&mut self, rule: InclusionRule) {
        if self.is_pending() {
            self.inclusion_status = InclusionStatus::Included;
            self.inclusion_rule = Some(rule);
        }
    }

    /// Non-empty enrichment, if any.
    pub fn enriched(&self) -> Option<&EnrichmentData> {
        self.enrichment.as_ref().filter(|e| !e.is_empty())
    }

    /// Text describing the candidate: enrichment when present, else hit text.
    pub fn describe(&self) -> String {
        match self.enriched() {
            Some(e) => {
                let mut parts = vec![self.domain.clone()];
                if !e.title.is_empty() {
                    parts.push(e.title.clone());
                }
                if !e.description.is_empty() {
                    parts.push(e.description.clone());
                }
                if !e.services.is_empty() {
                    parts.push(format!("Services: {}", e.services.join(", ")));
                }
                if !e.keywords.is_empty() {
                    parts.push(format!("Keywords: {}", e.keywords.join(", ")));
                }
                parts.join(". ")
            }
            None => self.hit_text(),
        }
    }

    /// Domain, titles and snippets of all hits.
    pub fn hit_text(&self) -> String {
        let mut parts = vec![self.domain.clone()];
        for hit in &self.hits {
            for piece in [hit.title.trim(), hit.snippet.trim()] {
                if !piece.is_empty() && !parts.iter().any(|p| p == piece) {
                    parts.push(piece.to_owned());
                }
            }
        }
        parts.join(". ")
    }

    /// Lower-cased text for pattern matching: hits, enrichment and page text.
    pub fn searchable_text(&self) -> String {
        let mut text = self.hit_text();
        if let Some(e) = &self.enrichment {
            text.push(' ');
            text.push_str(&e.description);
            text.push(' ');
            text.push_str(&e.services.join(" "));
            text.push(' ');
            text.push_str(&e.text);
        }
        text.to_lowercase()
    }

    /// Human-readable justification of the outcome.
    pub fn rationale(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        match (&self.relevance_label, self.relevance_score) {
            (Some(label), Some(score)) if self.relevance_fallback => parts.push(format!(
                "relevance {score:.2} ({}) by fallback: classifier unavailable",
                label.name()
            )),
            (Some(label), Some(score)) => {
                let reason = self.relevance_reason.as_deref().unwrap_or_default();
                if reason.is_empty() {
                    parts.push(format!("relevance {score:.2} ({})", label.name()));
                } else {
                    parts.push(format!("relevance {score:.2} ({}): {reason}", label.name()));
                }
            }
            _ => {}
        }

        if self.cross_validated {
            parts.push(format!(
                "found by {} sources ({})",
                self.sources.len(),
                self.sources.join(", ")
            ));
        }
        if let Some(similarity) = self.semantic_similarity {
            if self.similarity_defaulted {
                parts.push("similarity unavailable".into());
            } else if similarity > 0.0 {
                parts.push(format!("similarity {similarity:.2}"));
            }
        }
        if self.geo_bonus_applied {
            parts.push("region match".into());
        }
        if let Some(category) = self.business_category {
            parts.push(format!("category {category}"));
        }
        if let Some(rule) = &self.inclusion_rule {
            parts.push(format!("included: {rule}"));
        }
        if let Some(reason) = &self.exclusion_reason {
            parts.push(format!("excluded: {reason}"));
        }

        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use rivalscope_search::orchestrator::group_by_domain;

    pub(crate) fn hit(source: &str, url: &str, rank: usize) -> RawHit {
        RawHit {
            source: source.into(),
            url: url.into(),
            title: format!("{url} title"),
            snippet: "Managed cloud hosting".into(),
            rank,
            query: "cloud hosting".into(),
        }
    }

    fn candidate() -> Candidate {
        let groups = group_by_domain(&[
            hit("duckduckgo", "https://nimbus.example/", 2),
            hit("brave", "https://www.nimbus.example/pricing", 0),
        ]);
        let group = groups.into_iter().next().unwrap();
        Candidate::from_group(group, 0, |id| match id {
            "brave" => Some(ProviderTier::Premium),
            _ => Some(ProviderTier::Free),
        })
    }

    #[test]
    fn label_from_score_boundaries() {
        assert_eq!(RelevanceLabel::from_score(0.8, 0.8, 0.6), RelevanceLabel::Direct);
        assert_eq!(RelevanceLabel::from_score(0.79, 0.8, 0.6), RelevanceLabel::Indirect);
        assert_eq!(RelevanceLabel::from_score(0.6, 0.8, 0.6), RelevanceLabel::Indirect);
        assert_eq!(RelevanceLabel::from_score(0.59, 0.8, 0.6), RelevanceLabel::None);
    }

    #[test]
    fn from_group_takes_best_tier_and_score() {
        let c = candidate();
        assert_eq!(c.domain, "nimbus.example");
        assert_eq!(c.url, "https://nimbus.example/");
        assert_eq!(c.best_tier, ProviderTier::Premium);
        assert!((c.source_score - 1.2).abs() < 1e-9);
        assert!(c.is_pending());
    }

    #[test]
    fn exclusion_is_sticky() {
        let mut c = candidate();
        c.exclude(ExclusionReason::Directory);
        c.exclude(ExclusionReason::AnalyticsPlatform);
        c.include(InclusionRule::Strict {
            min_combined: 0.45,
            min_confidence: 0.35,
        });
        assert_eq!(c.inclusion_status, InclusionStatus::Excluded);
        assert_eq!(c.exclusion_reason, Some(ExclusionReason::Directory));
        assert!(c.inclusion_rule.is_none());
    }

    #[test]
    fn describe_prefers_enrichment() {
        let mut c = candidate();
        assert!(c.describe().contains("Managed cloud hosting"));
        c.enrichment = Some(EnrichmentData {
            description: "Kubernetes experts".into(),
            services: vec!["Cloud migration".into()],
            ..EnrichmentData::default()
        });
        let text = c.describe();
        assert!(text.contains("Kubernetes experts"));
        assert!(text.contains("Services: Cloud migration"));
    }

    #[test]
    fn empty_enrichment_falls_back_to_hits() {
        let mut c = candidate();
        c.enrichment = Some(EnrichmentData::default());
        assert!(c.enriched().is_none());
        assert_eq!(c.describe(), c.hit_text());
    }

    #[test]
    fn rationale_mentions_fallback_and_sources() {
        let mut c = candidate();
        c.relevance_score = Some(0.6);
        c.relevance_label = Some(RelevanceLabel::Indirect);
        c.relevance_fallback = true;
        c.cross_validated = true;
        let rationale = c.rationale();
        assert!(rationale.contains("fallback"));
        assert!(rationale.contains("duckduckgo, brave"));
    }

    #[test]
    fn exclusion_reason_serialises_with_kind() {
        let json = serde_json::to_value(ExclusionReason::DiversityCap {
            category: BusinessCategory::Agency,
        })
        .unwrap();
        assert_eq!(json["kind"], "diversity_cap");
        assert_eq!(json["category"], "agency");
    }

    #[test]
    fn inclusion_rule_display() {
        let rule = InclusionRule::Relaxed {
            step: 2,
            min_combined: 0.35,
            min_confidence: 0.25,
        };
        assert_eq!(
            rule.to_string(),
            "relaxed step 2 (combined >= 0.35, confidence >= 0.25)"
        );
    }
}
