//! Shared test doubles for the pipeline integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rivalscope::result::PipelineResult;
use rivalscope::{
    Classification, ClassifierError, ClientProfile, CompetitorPipeline, DiscoveryConfig,
    EmbeddingError, EmbeddingService, InclusionStatus, RelevanceLabel, TextClassifier,
};
use rivalscope_search::{FetchedPage, PageFetcher, ProviderTier, RawHit, SearchError, SearchProvider};

pub(crate) const CLIENT: &str = "acme-hosting.example";

/// One scripted hit: (url, title, snippet).
pub(crate) type HitSpec = (String, String, String);

/// Provider returning the same scripted hits for every query.
pub(crate) struct ScriptedProvider {
    id: String,
    tier: ProviderTier,
    hits: Vec<HitSpec>,
    /// Calls whose sequence number is in this list sleep this long.
    slow_calls: Vec<usize>,
    slow_for: Duration,
    pub(crate) calls: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn new(id: &str, hits: Vec<HitSpec>) -> Self {
        Self {
            id: id.to_owned(),
            tier: ProviderTier::Free,
            hits,
            slow_calls: Vec::new(),
            slow_for: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn premium(mut self) -> Self {
        self.tier = ProviderTier::Premium;
        self
    }

    pub(crate) fn with_slow_calls(mut self, calls: Vec<usize>, slow_for: Duration) -> Self {
        self.slow_calls = calls;
        self.slow_for = slow_for;
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn tier(&self) -> ProviderTier {
        self.tier
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawHit>, SearchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.slow_calls.contains(&n) {
            tokio::time::sleep(self.slow_for).await;
        }
        Ok(self
            .hits
            .iter()
            .take(limit)
            .enumerate()
            .map(|(rank, (url, title, snippet))| RawHit {
                source: self.id.clone(),
                url: url.clone(),
                title: title.clone(),
                snippet: snippet.clone(),
                rank,
                query: query.to_owned(),
            })
            .collect())
    }
}

/// Fetcher serving HTML per domain; unknown domains are not HTML.
#[derive(Default)]
pub(crate) struct MapFetcher {
    pages: HashMap<String, String>,
}

impl MapFetcher {
    pub(crate) fn with_page(mut self, domain: &str, html: &str) -> Self {
        self.pages.insert(domain.to_owned(), html.to_owned());
        self
    }
}

#[async_trait]
impl PageFetcher for MapFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, SearchError> {
        let domain = url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        match self.pages.get(domain) {
            Some(html) => Ok(FetchedPage {
                html: html.clone(),
                status: 200,
                content_type: Some("text/html; charset=utf-8".into()),
                final_url: url.to_owned(),
            }),
            None => Err(SearchError::NotHtml(format!("{url} is not HTML"))),
        }
    }
}

/// Classifier scoring each text with a closure.
pub(crate) struct FnClassifier<F> {
    score: F,
    pub(crate) batches: AtomicUsize,
}

impl<F> FnClassifier<F>
where
    F: Fn(&str) -> f64 + Send + Sync,
{
    pub(crate) fn new(score: F) -> Self {
        Self {
            score,
            batches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<F> TextClassifier for FnClassifier<F>
where
    F: Fn(&str) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        "fn-classifier"
    }

    async fn classify(
        &self,
        _profile_summary: &str,
        candidate_texts: &[String],
    ) -> Result<Vec<Classification>, ClassifierError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(candidate_texts
            .iter()
            .map(|text| {
                let score = (self.score)(text);
                Classification {
                    score,
                    label: RelevanceLabel::from_score(score, 0.8, 0.6),
                    reason: format!("scored {score:.2}"),
                }
            })
            .collect())
    }
}

/// Classifier that is always down.
pub(crate) struct DownClassifier;

#[async_trait]
impl TextClassifier for DownClassifier {
    fn name(&self) -> &str {
        "down"
    }

    async fn classify(
        &self,
        _profile_summary: &str,
        _candidate_texts: &[String],
    ) -> Result<Vec<Classification>, ClassifierError> {
        Err(ClassifierError::Unavailable("connection refused".into()))
    }
}

/// Two-dimensional embedder: texts mentioning "hosting" point one way,
/// everything else the other.
pub(crate) struct TopicEmbedder;

#[async_trait]
impl EmbeddingService for TopicEmbedder {
    fn name(&self) -> &str {
        "topic"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.to_lowercase().contains("hosting") {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.0, 1.0])
        }
    }
}

pub(crate) fn hit(domain: &str, snippet: &str) -> HitSpec {
    (
        format!("https://{domain}/"),
        format!("{domain} home"),
        snippet.to_owned(),
    )
}

/// `n` hosting companies named `{prefix}{i}.example`.
pub(crate) fn hosting_hits(prefix: &str, n: usize) -> Vec<HitSpec> {
    (0..n)
        .map(|i| {
            hit(
                &format!("{prefix}{i}.example"),
                "Managed cloud hosting for growing teams",
            )
        })
        .collect()
}

pub(crate) fn profile() -> ClientProfile {
    let mut p = ClientProfile::new(
        CLIENT,
        vec!["cloud hosting".into(), "managed hosting".into()],
    );
    p.secondary_keywords = vec!["server migration".into()];
    p.target_audience = "small businesses".into();
    p
}

pub(crate) fn config() -> DiscoveryConfig {
    let mut config = DiscoveryConfig::default();
    config.queries.max_generated = 12;
    config.queries.max_executed = 6;
    config.search.per_provider_cap = 50;
    config.search.call_timeout_secs = 1;
    config.search.cache_ttl_secs = 0;
    config.enrichment.fetch_timeout_secs = 1;
    config
}

pub(crate) fn hosting_score(text: &str) -> f64 {
    if text.to_lowercase().contains("hosting") {
        0.85
    } else {
        0.2
    }
}

pub(crate) fn pipeline(
    config: DiscoveryConfig,
    providers: Vec<Arc<dyn SearchProvider>>,
    fetcher: MapFetcher,
) -> CompetitorPipeline {
    CompetitorPipeline::new(config, providers, Arc::new(fetcher)).expect("valid pipeline")
}

/// Invariants every completed run must satisfy.
pub(crate) fn assert_invariants(result: &PipelineResult) {
    for view in &result.all_candidates {
        assert_ne!(view.domain, CLIENT);
        assert!(
            !view.domain.ends_with(&format!(".{CLIENT}")),
            "client sub-domain {} leaked",
            view.domain
        );
        assert_ne!(view.inclusion_status, InclusionStatus::Pending, "{} left pending", view.domain);
        assert_eq!(
            view.inclusion_status == InclusionStatus::Excluded,
            view.exclusion_reason.is_some(),
            "exclusion reason mismatch for {}",
            view.domain
        );
    }
    for view in &result.competitors {
        assert_eq!(view.inclusion_status, InclusionStatus::Included);
        assert!(view.inclusion_rule.is_some());
    }
    assert!(result.competitors.len() <= result.thresholds.limit);
}
