//! Embedding similarity between the client profile and candidates.

use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::candidate::Candidate;
use crate::capability::{EmbeddingService, cosine_similarity};
use crate::config::SemanticConfig;
use crate::error::{DiscoveryError, Result};
use crate::profile::ClientProfile;
use crate::result::{DegradedEvent, DegradedStage};

const MAX_CONCURRENT_EMBEDDINGS: usize = 4;

/// Text embedded as the similarity target: the profile keywords, or the
/// client domain when there are none.
pub fn target_text(profile: &ClientProfile, client_domain: &str) -> String {
    let keywords = profile.keywords();
    if keywords.is_empty() {
        client_domain.to_owned()
    } else {
        keywords.join(", ")
    }
}

/// Score semantic similarity for the most relevant pending candidates.
///
/// At most `max_batch` candidates, taken by relevance (discovery order
/// breaks ties), are embedded; the rest get a similarity of 0 without
/// being flagged. Embedding failures set 0, `similarity_defaulted` and
/// record a [`DegradedEvent`].
///
/// # Errors
///
/// [`DiscoveryError::Cancelled`] when `cancel` fires during a request.
pub async fn score_similarity(
    candidates: &mut [Candidate],
    profile: &ClientProfile,
    client_domain: &str,
    embedder: Option<&dyn EmbeddingService>,
    config: &SemanticConfig,
    cancel: &CancellationToken,
) -> Result<Vec<DegradedEvent>> {
    let mut pending: Vec<usize> = (0..candidates.len())
        .filter(|&i| candidates[i].is_pending())
        .collect();
    for &i in &pending {
        candidates[i].semantic_similarity = Some(0.0);
        candidates[i].similarity_defaulted = false;
    }
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    pending.sort_by(|&a, &b| {
        let ra = candidates[a].relevance_score.unwrap_or(0.0);
        let rb = candidates[b].relevance_score.unwrap_or(0.0);
        rb.total_cmp(&ra)
            .then(candidates[a].discovery_order.cmp(&candidates[b].discovery_order))
    });
    pending.truncate(config.max_batch);

    let Some(embedder) = embedder else {
        return Ok(vec![default_all(candidates, &pending, "embedding service not configured".into())]);
    };

    let timeout = Duration::from_secs(config.timeout_secs);
    let target = target_text(profile, client_domain);

    let target_vector = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            return Err(DiscoveryError::Cancelled("cancelled during semantic scoring".into()));
        }
        result = tokio::time::timeout(timeout, embedder.embed(&target)) => result,
    };
    let target_vector = match target_vector {
        Ok(Ok(v)) => v,
        Ok(Err(e)) => {
            tracing::warn!(embedder = embedder.name(), error = %e, "target embedding failed, similarity defaults to 0");
            return Ok(vec![default_all(candidates, &pending, e.to_string())]);
        }
        Err(_) => {
            tracing::warn!(embedder = embedder.name(), "target embedding timed out, similarity defaults to 0");
            return Ok(vec![default_all(
                candidates,
                &pending,
                format!("embedding timed out after {timeout:?}"),
            )]);
        }
    };

    let jobs: Vec<(usize, String)> = pending.iter().map(|&i| (i, candidates[i].describe())).collect();
    let embeddings = stream::iter(jobs)
        .map(|(index, text)| async move {
            let result = match tokio::time::timeout(timeout, embedder.embed(&text)).await {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("embedding timed out after {timeout:?}")),
            };
            (index, result)
        })
        .buffer_unordered(MAX_CONCURRENT_EMBEDDINGS)
        .collect::<Vec<_>>();

    let mut outcomes = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            return Err(DiscoveryError::Cancelled("cancelled during semantic scoring".into()));
        }
        outcomes = embeddings => outcomes,
    };
    outcomes.sort_by_key(|(index, _)| *index);

    let mut failed = Vec::new();
    let mut last_error = String::new();
    for (index, result) in outcomes {
        let similarity = result.and_then(|vector| {
            cosine_similarity(&target_vector, &vector)
                .ok_or_else(|| "embedding dimensions do not match".to_owned())
        });
        match similarity {
            Ok(s) => candidates[index].semantic_similarity = Some(s.clamp(0.0, 1.0)),
            Err(e) => {
                candidates[index].similarity_defaulted = true;
                failed.push(candidates[index].domain.clone());
                last_error = e;
            }
        }
    }

    let mut events = Vec::new();
    if !failed.is_empty() {
        tracing::warn!(embedder = embedder.name(), failed = failed.len(), error = %last_error, "embeddings failed, similarity defaults to 0");
        events.push(DegradedEvent {
            stage: DegradedStage::Embedding,
            detail: last_error,
            domains: failed,
        });
    }
    tracing::info!(scored = pending.len(), degraded = events.len(), "semantic scoring complete");
    Ok(events)
}

fn default_all(candidates: &mut [Candidate], indices: &[usize], detail: String) -> DegradedEvent {
    let mut domains = Vec::with_capacity(indices.len());
    for &i in indices {
        candidates[i].semantic_similarity = Some(0.0);
        candidates[i].similarity_defaulted = true;
        domains.push(candidates[i].domain.clone());
    }
    DegradedEvent {
        stage: DegradedStage::Embedding,
        detail,
        domains,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use async_trait::async_trait;
    use rivalscope_search::RawHit;
    use rivalscope_search::orchestrator::group_by_domain;

    use super::*;
    use crate::capability::EmbeddingError;

    /// Two-dimensional embedding: "cloud" pulls towards x, anything else towards y.
    struct ToyEmbedder {
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl EmbeddingService for ToyEmbedder {
        fn name(&self) -> &str {
            "toy"
        }

        async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            if self.fail_on.is_some_and(|f| text.contains(f)) {
                return Err(EmbeddingError::Unavailable("boom".into()));
            }
            if text.contains("cloud") {
                Ok(vec![1.0, 0.1])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }
    }

    fn candidates(snippets: &[&str]) -> Vec<Candidate> {
        let hits: Vec<RawHit> = snippets
            .iter()
            .enumerate()
            .map(|(i, s)| RawHit {
                source: "duckduckgo".into(),
                url: format!("https://c{i}.example/"),
                title: String::new(),
                snippet: (*s).into(),
                rank: i,
                query: "q".into(),
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

    #[test]
    fn target_falls_back_to_domain() {
        let mut p = profile();
        assert_eq!(target_text(&p, "acme.example"), "cloud hosting");
        p.primary_keywords.clear();
        assert_eq!(target_text(&p, "acme.example"), "acme.example");
    }

    #[tokio::test]
    async fn similarity_is_clamped_and_bounded_by_batch() {
        let mut cs = candidates(&["cloud servers", "bakery", "cloud backup"]);
        cs[0].relevance_score = Some(0.9);
        cs[1].relevance_score = Some(0.8);
        cs[2].relevance_score = Some(0.1);
        let config = SemanticConfig {
            max_batch: 2,
            ..SemanticConfig::default()
        };
        let events = score_similarity(
            &mut cs,
            &profile(),
            "acme.example",
            Some(&ToyEmbedder { fail_on: None }),
            &config,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(events.is_empty());
        assert!(cs[0].semantic_similarity.unwrap() > 0.99);
        let s1 = cs[1].semantic_similarity.unwrap();
        assert!((0.0..0.2).contains(&s1));
        // Outside the batch: 0 without the degraded flag.
        assert_eq!(cs[2].semantic_similarity, Some(0.0));
        assert!(!cs[2].similarity_defaulted);
    }

    #[tokio::test]
    async fn failures_default_to_zero() {
        let mut cs = candidates(&["cloud servers", "cloud fail"]);
        let events = score_similarity(
            &mut cs,
            &profile(),
            "acme.example",
            Some(&ToyEmbedder {
                fail_on: Some("fail"),
            }),
            &SemanticConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].domains, vec!["c1.example"]);
        assert!(cs[1].similarity_defaulted);
        assert_eq!(cs[1].semantic_similarity, Some(0.0));
        assert!(!cs[0].similarity_defaulted);
    }

    #[tokio::test]
    async fn target_failure_defaults_everything() {
        let mut cs = candidates(&["cloud servers", "bakery"]);
        let events = score_similarity(
            &mut cs,
            &profile(),
            "acme.example",
            Some(&ToyEmbedder {
                fail_on: Some("cloud hosting"),
            }),
            &SemanticConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(events.len(), 1);
        assert!(cs.iter().all(|c| c.similarity_defaulted));
    }
}
