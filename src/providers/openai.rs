//! OpenAI-compatible classifier and embedder.
//!
//! - [`OpenAiClassifier`] posts one Chat Completions request per batch
//!   (`/v1/chat/completions`) in JSON mode and parses a typed verdict list
//! - [`OpenAiEmbedder`] posts to `/v1/embeddings`
//!
//! Any server speaking these two endpoints works (OpenAI, Azure-style
//! proxies, local gateways); point `base_url` at it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rivalscope::capability::TextClassifier;
//! use rivalscope::providers::openai::{OpenAiClassifier, OpenAiConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let classifier = OpenAiClassifier::new(OpenAiConfig::new("sk-...", "gpt-4o-mini"))?;
//! let verdicts = classifier
//!     .classify("Client site acme.example active in: cloud hosting.", &["strato.example. Managed cloud".into()])
//!     .await?;
//! println!("{:.2}", verdicts[0].score);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::candidate::RelevanceLabel;
use crate::capability::{
    Classification, ClassifierError, EmbeddingError, EmbeddingService, TextClassifier,
};

// ── Configuration ─────────────────────────────────────────────

/// Connection settings shared by the classifier and the embedder.
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL (defaults to `https://api.openai.com`).
    pub base_url: String,
    /// The model to use.
    pub model: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Create a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".into(),
            model: model.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Failure categories shared by both adapters before mapping to the
/// capability's own error type.
enum HttpFailure {
    Auth(String),
    RateLimited(String),
    Unavailable(String),
}

fn map_http_error(status: reqwest::StatusCode, body: &str) -> HttpFailure {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => HttpFailure::Auth(message),
        429 => HttpFailure::RateLimited(message),
        code => HttpFailure::Unavailable(format!("HTTP {code}: {message}")),
    }
}

/// Extract an error message from an OpenAI error response body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| format!("failed to build HTTP client: {e}"))
}

async fn post_json(
    client: &reqwest::Client,
    config: &OpenAiConfig,
    path: &str,
    body: &serde_json::Value,
) -> Result<String, HttpFailure> {
    let response = client
        .post(config.endpoint(path))
        .header("Authorization", format!("Bearer {}", config.api_key))
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                HttpFailure::Unavailable(format!("request timed out after {:?}", config.timeout))
            } else {
                HttpFailure::Unavailable(format!("request failed: {e}"))
            }
        })?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(map_http_error(status, &text));
    }
    Ok(text)
}

// ── Classifier ────────────────────────────────────────────────

const CLASSIFIER_INSTRUCTIONS: &str = "You assess whether web sites are market competitors of a client. \
For every numbered candidate return an object with: index (the candidate number), \
score (0.0 to 1.0, how directly the candidate competes with the client), \
label (\"direct\" for the same product and market, \"indirect\" for the same industry with an adjacent offering, \"none\" otherwise) \
and reason (one short sentence). \
Answer with a JSON object {\"results\": [...]} containing exactly one entry per candidate.";

/// Build the Chat Completions body for one batch.
pub fn build_classification_request(
    model: &str,
    profile_summary: &str,
    candidate_texts: &[String],
) -> serde_json::Value {
    let mut listing = String::new();
    for (i, text) in candidate_texts.iter().enumerate() {
        listing.push_str(&format!("{i}. {}\n", text.trim()));
    }
    serde_json::json!({
        "model": model,
        "temperature": 0,
        "response_format": {"type": "json_object"},
        "messages": [
            {"role": "system", "content": CLASSIFIER_INSTRUCTIONS},
            {"role": "user", "content": format!("Client: {profile_summary}\n\nCandidates:\n{listing}")},
        ],
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerdictList {
    results: Vec<WireVerdict>,
}

#[derive(Debug, Deserialize)]
struct WireVerdict {
    #[serde(default)]
    index: Option<usize>,
    /// Kept loose so one malformed score only spoils its own verdict.
    #[serde(default)]
    score: serde_json::Value,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    reason: String,
}

fn parse_label(label: Option<&str>, score: f64) -> RelevanceLabel {
    match label.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
        Some("direct") => RelevanceLabel::Direct,
        Some("indirect") => RelevanceLabel::Indirect,
        Some("none") => RelevanceLabel::None,
        _ => RelevanceLabel::from_score(score, 0.8, 0.6),
    }
}

/// Parse a Chat Completions response body into verdicts in input order.
///
/// # Errors
///
/// [`ClassifierError::Contract`] when the body, the embedded JSON or the
/// number of verdicts does not match.
pub fn parse_classification_response(
    body: &str,
    expected: usize,
) -> Result<Vec<Classification>, ClassifierError> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| ClassifierError::Contract(format!("invalid completion body: {e}")))?;
    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ClassifierError::Contract("completion has no content".into()))?;
    let list: VerdictList = serde_json::from_str(strip_fences(&content))
        .map_err(|e| ClassifierError::Contract(format!("invalid verdict JSON: {e}")))?;

    if list.results.len() != expected {
        return Err(ClassifierError::Contract(format!(
            "expected {expected} verdicts, got {}",
            list.results.len()
        )));
    }

    let mut slots: Vec<Option<Classification>> = vec![None; expected];
    for (position, verdict) in list.results.into_iter().enumerate() {
        let index = verdict.index.unwrap_or(position);
        let slot = slots.get_mut(index).ok_or_else(|| {
            ClassifierError::Contract(format!("verdict index {index} out of range"))
        })?;
        if slot.is_some() {
            return Err(ClassifierError::Contract(format!("duplicate verdict index {index}")));
        }
        // Non-numeric scores become NaN and fail `Classification::is_usable`.
        let score = verdict.score.as_f64().unwrap_or(f64::NAN);
        *slot = Some(Classification {
            label: parse_label(verdict.label.as_deref(), score),
            score,
            reason: verdict.reason.trim().to_owned(),
        });
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| ClassifierError::Contract(format!("missing verdict {i}"))))
        .collect()
}

/// Some models wrap JSON in a Markdown fence even in JSON mode.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Relevance classifier backed by a Chat Completions endpoint.
pub struct OpenAiClassifier {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiClassifier {
    /// Create a classifier.
    ///
    /// # Errors
    ///
    /// [`ClassifierError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, ClassifierError> {
        let client = build_client(config.timeout).map_err(ClassifierError::Unavailable)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl TextClassifier for OpenAiClassifier {
    fn name(&self) -> &str {
        "openai"
    }

    async fn classify(
        &self,
        profile_summary: &str,
        candidate_texts: &[String],
    ) -> Result<Vec<Classification>, ClassifierError> {
        if candidate_texts.is_empty() {
            return Ok(Vec::new());
        }
        let body =
            build_classification_request(&self.config.model, profile_summary, candidate_texts);
        tracing::debug!(model = %self.config.model, batch = candidate_texts.len(), "classification request");

        let text = post_json(&self.client, &self.config, "/v1/chat/completions", &body)
            .await
            .map_err(|failure| match failure {
                HttpFailure::Auth(m) => ClassifierError::Auth(m),
                HttpFailure::RateLimited(m) => ClassifierError::RateLimited(m),
                HttpFailure::Unavailable(m) => ClassifierError::Unavailable(m),
            })?;
        parse_classification_response(&text, candidate_texts.len())
    }
}

impl fmt::Debug for OpenAiClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClassifier")
            .field("config", &self.config)
            .finish()
    }
}

// ── Embedder ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

/// Embedding service backed by an `/v1/embeddings` endpoint.
pub struct OpenAiEmbedder {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    /// Create an embedder.
    ///
    /// # Errors
    ///
    /// [`EmbeddingError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, EmbeddingError> {
        let client = build_client(config.timeout).map_err(EmbeddingError::Unavailable)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "input": text,
        });
        let text = post_json(&self.client, &self.config, "/v1/embeddings", &body)
            .await
            .map_err(|failure| match failure {
                HttpFailure::Auth(m) => EmbeddingError::Auth(m),
                HttpFailure::RateLimited(m) => EmbeddingError::RateLimited(m),
                HttpFailure::Unavailable(m) => EmbeddingError::Unavailable(m),
            })?;

        let parsed: EmbeddingResponse = serde_json::from_str(&text)
            .map_err(|e| EmbeddingError::Contract(format!("invalid embeddings body: {e}")))?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .unwrap_or_default();
        if vector.is_empty() {
            return Err(EmbeddingError::Contract("empty embedding".into()));
        }
        Ok(vector)
    }
}

impl fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("config", &self.config)
            .finish()
    }
}
