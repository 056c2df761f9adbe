//! Relevance classification with a documented fallback.
//!
//! Pending candidates are sent to the [`TextClassifier`] in batches. A
//! batch that errors, times out or returns the wrong number of verdicts
//! falls back as a whole; a single verdict with an unusable score falls
//! back alone. Fallback candidates get the configured neutral score, a
//! label derived from it, `relevance_fallback = true`, and a
//! [`DegradedEvent`] naming them.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::candidate::{Candidate, RelevanceLabel};
use crate::capability::{Classification, TextClassifier};
use crate::config::ClassifierConfig;
use crate::error::{DiscoveryError, Result};
use crate::profile::ClientProfile;
use crate::result::{DegradedEvent, DegradedStage};

/// Classify every pending candidate.
///
/// `classifier` is `None` when classification is disabled or not
/// configured; every candidate then takes the fallback.
///
/// # Errors
///
/// [`DiscoveryError::Cancelled`] when `cancel` fires during a request.
pub async fn classify_relevance(
    candidates: &mut [Candidate],
    profile: &ClientProfile,
    classifier: Option<&dyn TextClassifier>,
    config: &ClassifierConfig,
    cancel: &CancellationToken,
) -> Result<Vec<DegradedEvent>> {
    let pending: Vec<usize> = (0..candidates.len())
        .filter(|&i| candidates[i].is_pending())
        .collect();
    let mut events = Vec::new();

    let Some(classifier) = classifier else {
        for &i in &pending {
            apply_fallback(&mut candidates[i], config);
        }
        if !pending.is_empty() {
            tracing::warn!(candidates = pending.len(), "no classifier configured, using fallback relevance");
            events.push(DegradedEvent {
                stage: DegradedStage::Classification,
                detail: "classifier not configured".into(),
                domains: pending.iter().map(|&i| candidates[i].domain.clone()).collect(),
            });
        }
        return Ok(events);
    };

    let summary = profile.summary();
    let timeout = Duration::from_secs(config.timeout_secs);

    for batch in pending.chunks(config.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|&i| candidates[i].describe()).collect();

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(DiscoveryError::Cancelled("cancelled during relevance classification".into()));
            }
            outcome = tokio::time::timeout(timeout, classifier.classify(&summary, &texts)) => outcome,
        };

        let verdicts: std::result::Result<Vec<Classification>, String> = match outcome {
            Err(_) => Err(format!("classifier timed out after {timeout:?}")),
            Ok(Err(e)) => Err(e.to_string()),
            Ok(Ok(v)) if v.len() != batch.len() => Err(format!(
                "classifier returned {} verdicts for {} candidates",
                v.len(),
                batch.len()
            )),
            Ok(Ok(v)) => Ok(v),
        };

        match verdicts {
            Ok(verdicts) => {
                let mut invalid = Vec::new();
                for (&i, verdict) in batch.iter().zip(verdicts) {
                    if verdict.is_usable() {
                        apply_verdict(&mut candidates[i], &verdict, config);
                    } else {
                        apply_fallback(&mut candidates[i], config);
                        invalid.push(candidates[i].domain.clone());
                    }
                }
                if !invalid.is_empty() {
                    tracing::warn!(classifier = classifier.name(), items = invalid.len(), "unusable verdicts, using fallback relevance");
                    events.push(DegradedEvent {
                        stage: DegradedStage::Classification,
                        detail: "verdict score missing or outside [0, 1]".into(),
                        domains: invalid,
                    });
                }
            }
            Err(detail) => {
                tracing::warn!(classifier = classifier.name(), batch = batch.len(), error = %detail, "classification batch failed, using fallback relevance");
                for &i in batch {
                    apply_fallback(&mut candidates[i], config);
                }
                events.push(DegradedEvent {
                    stage: DegradedStage::Classification,
                    detail,
                    domains: batch.iter().map(|&i| candidates[i].domain.clone()).collect(),
                });
            }
        }
    }

    tracing::info!(
        classified = pending.len(),
        degraded_batches = events.len(),
        "relevance classification complete"
    );
    Ok(events)
}

fn apply_verdict(candidate: &mut Candidate, verdict: &Classification, config: &ClassifierConfig) {
    candidate.relevance_score = Some(verdict.score);
    candidate.relevance_label = Some(RelevanceLabel::from_score(
        verdict.score,
        config.direct_threshold,
        config.indirect_threshold,
    ));
    candidate.relevance_reason = Some(verdict.reason.clone()).filter(|r| !r.is_empty());
    candidate.relevance_fallback = false;
}

fn apply_fallback(candidate: &mut Candidate, config: &ClassifierConfig) {
    candidate.relevance_score = Some(config.fallback_score);
    candidate.relevance_label = Some(RelevanceLabel::from_score(
        config.fallback_score,
        config.direct_threshold,
        config.indirect_threshold,
    ));
    candidate.relevance_reason = None;
    candidate.relevance_fallback = true;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rivalscope_search::RawHit;
    use rivalscope_search::orchestrator::group_by_domain;

    use super::*;
    use crate::capability::ClassifierError;

    /// Scores from a closure over the candidate text; fails selected calls.
    struct FnClassifier<F> {
        score: F,
        fail_call: Option<usize>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl<F> TextClassifier for FnClassifier<F>
    where
        F: Fn(&str) -> f64 + Send + Sync,
    {
        fn name(&self) -> &str {
            "fn"
        }

        async fn classify(
            &self,
            _summary: &str,
            texts: &[String],
        ) -> std::result::Result<Vec<Classification>, ClassifierError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_call == Some(call) {
                return Err(ClassifierError::Unavailable("503".into()));
            }
            Ok(texts
                .iter()
                .map(|t| Classification {
                    score: (self.score)(t),
                    label: RelevanceLabel::None,
                    reason: format!("scored {t}"),
                })
                .collect())
        }
    }

    fn candidates(n: usize) -> Vec<Candidate> {
        let hits: Vec<RawHit> = (0..n)
            .map(|i| RawHit {
                source: "duckduckgo".into(),
                url: format!("https://site{i}.example/"),
                title: format!("Site {i}"),
                snippet: "cloud hosting".into(),
                rank: i,
                query: "cloud hosting".into(),
            })
            .collect();
        group_by_domain(&hits)
            .into_iter()
            .enumerate()
            .map(|(i, g)| Candidate::from_group(g, i, |_| None))
            .collect()
    }

    fn profile() -> ClientProfile {
        ClientProfile::new("acme.example", vec!["cloud hosting".into()])
    }

    #[tokio::test]
    async fn labels_follow_scores() {
        let classifier = FnClassifier {
            score: |t: &str| if t.contains("site0") { 0.9 } else { 0.65 },
            fail_call: None,
            calls: AtomicUsize::new(0),
        };
        let mut cs = candidates(3);
        let events = classify_relevance(
            &mut cs,
            &profile(),
            Some(&classifier),
            &ClassifierConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(events.is_empty());
        assert_eq!(cs[0].relevance_label, Some(RelevanceLabel::Direct));
        assert_eq!(cs[1].relevance_label, Some(RelevanceLabel::Indirect));
        assert!(cs[0].relevance_reason.as_deref().unwrap().starts_with("scored"));
        assert!(!cs[0].relevance_fallback);
    }

    #[tokio::test]
    async fn failed_batch_falls_back_alone() {
        let classifier = FnClassifier {
            score: |_: &str| 0.95,
            fail_call: Some(1),
            calls: AtomicUsize::new(0),
        };
        let config = ClassifierConfig {
            batch_size: 2,
            ..ClassifierConfig::default()
        };
        let mut cs = candidates(5);
        let events = classify_relevance(
            &mut cs,
            &profile(),
            Some(&classifier),
            &config,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].domains, vec!["site2.example", "site3.example"]);
        assert!(cs[2].relevance_fallback && cs[3].relevance_fallback);
        assert_eq!(cs[2].relevance_score, Some(0.6));
        assert_eq!(cs[2].relevance_label, Some(RelevanceLabel::Indirect));
        assert_eq!(cs[4].relevance_label, Some(RelevanceLabel::Direct));
    }

    #[tokio::test]
    async fn invalid_score_falls_back_per_item() {
        let classifier = FnClassifier {
            score: |t: &str| if t.contains("site1") { 7.0 } else { 0.2 },
            fail_call: None,
            calls: AtomicUsize::new(0),
        };
        let mut cs = candidates(2);
        let events = classify_relevance(
            &mut cs,
            &profile(),
            Some(&classifier),
            &ClassifierConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].domains, vec!["site1.example"]);
        assert_eq!(cs[0].relevance_label, Some(RelevanceLabel::None));
        assert!(cs[1].relevance_fallback);
    }

    #[tokio::test]
    async fn missing_classifier_falls_back_everywhere() {
        let mut cs = candidates(3);
        cs[2].exclude(crate::candidate::ExclusionReason::Directory);
        let events = classify_relevance(
            &mut cs,
            &profile(),
            None,
            &ClassifierConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].domains.len(), 2);
        assert!(cs[..2].iter().all(|c| c.relevance_fallback));
        assert!(cs[2].relevance_score.is_none());
    }
}
