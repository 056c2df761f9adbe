//! Capabilities consumed by the relevance and similarity stages.
//!
//! The pipeline only depends on these traits. HTTP implementations live in
//! [`crate::providers`]; tests substitute in-memory ones.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::candidate::RelevanceLabel;

/// Errors from a [`TextClassifier`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierError {
    /// The service could not be reached or answered with a server error.
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    /// Credentials rejected.
    #[error("classifier authentication failed: {0}")]
    Auth(String),

    /// The service throttled the request.
    #[error("classifier rate limited: {0}")]
    RateLimited(String),

    /// The response did not match the typed contract.
    #[error("classifier contract violation: {0}")]
    Contract(String),
}

/// Errors from an [`EmbeddingService`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    /// The service could not be reached or answered with a server error.
    #[error("embedding service unavailable: {0}")]
    Unavailable(String),

    /// Credentials rejected.
    #[error("embedding authentication failed: {0}")]
    Auth(String),

    /// The service throttled the request.
    #[error("embedding rate limited: {0}")]
    RateLimited(String),

    /// The response did not match the typed contract.
    #[error("embedding contract violation: {0}")]
    Contract(String),
}

/// One classifier verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Relevance in [0, 1].
    pub score: f64,
    /// Label reported by the service. The pipeline re-derives it from the score.
    pub label: RelevanceLabel,
    /// Short rationale.
    #[serde(default)]
    pub reason: String,
}

impl Classification {
    /// True when the score is a finite number in [0, 1].
    pub fn is_usable(&self) -> bool {
        self.score.is_finite() && (0.0..=1.0).contains(&self.score)
    }
}

/// Free-text relevance classification.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Score each candidate text against the client summary.
    ///
    /// Implementations return exactly one verdict per input text, in input
    /// order. Any other cardinality is treated as a batch failure.
    async fn classify(
        &self,
        profile_summary: &str,
        candidate_texts: &[String],
    ) -> Result<Vec<Classification>, ClassifierError>;
}

/// Text embedding.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Cosine similarity of two vectors.
///
/// Returns `None` when the lengths differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
