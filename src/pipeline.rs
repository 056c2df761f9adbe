//! The discovery pipeline: stage sequencing, cancellation and wiring.
//!
//! A [`CompetitorPipeline`] holds read-only collaborators (providers,
//! fetcher, classifier, embedder) and can serve many runs concurrently.
//! Each [`CompetitorPipeline::run`] owns its candidate set; nothing
//! mutable is shared between runs except the providers' own rate
//! limiters, breakers and caches.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use rivalscope_search::engines::{BingProvider, BraveProvider, DuckDuckGoProvider};
use rivalscope_search::orchestrator::{FanOutOptions, group_by_domain, search_all};
use rivalscope_search::{
    CachedProvider, CircuitBreakerConfig, GuardedProvider, HttpPageFetcher, PageFetcher,
    SearchConfig, SearchProvider,
};

use crate::candidate::{Candidate, InclusionStatus};
use crate::capability::{EmbeddingService, TextClassifier};
use crate::config::{DiscoveryConfig, ProviderSettings};
use crate::error::{DiscoveryError, Result};
use crate::profile::ClientProfile;
use crate::providers::{OpenAiClassifier, OpenAiConfig, OpenAiEmbedder};
use crate::result::{CandidateView, PipelineResult, ThresholdReport};
use crate::stages::enrich::run_vocabulary;
use crate::stages::rank::client_regions;
use crate::stages::{self, PreFilter};

/// Competitor discovery pipeline.
pub struct CompetitorPipeline {
    config: DiscoveryConfig,
    providers: Vec<Arc<dyn SearchProvider>>,
    fetcher: Arc<dyn PageFetcher>,
    classifier: Option<Arc<dyn TextClassifier>>,
    embedder: Option<Arc<dyn EmbeddingService>>,
    prefilter: PreFilter,
}

impl CompetitorPipeline {
    /// Create a pipeline over explicit collaborators.
    ///
    /// Classification and embeddings start unset, so both fall back until
    /// [`with_classifier`](Self::with_classifier) /
    /// [`with_embedder`](Self::with_embedder) are called.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Config`] for an invalid configuration or an empty
    /// provider list.
    pub fn new(
        config: DiscoveryConfig,
        providers: Vec<Arc<dyn SearchProvider>>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        if providers.is_empty() {
            return Err(DiscoveryError::Config("at least one search provider is required".into()));
        }
        let prefilter = PreFilter::new(&config.filters)?;
        Ok(Self {
            config,
            providers,
            fetcher,
            classifier: None,
            embedder: None,
            prefilter,
        })
    }

    /// Build the HTTP stack described by `config`.
    ///
    /// Providers are wrapped with their quota, circuit breaker and cache.
    /// The classifier and embedder are created when enabled and their API
    /// key variable is set; otherwise the stage runs on its fallback.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Config`] when no provider can be built.
    pub fn from_config(config: DiscoveryConfig) -> Result<Self> {
        config.validate()?;
        let providers = build_providers(&config)?;
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(&search_config(&config))?);
        let classifier = build_classifier(&config);
        let embedder = build_embedder(&config);

        let mut pipeline = Self::new(config, providers, fetcher)?;
        pipeline.classifier = classifier;
        pipeline.embedder = embedder;
        Ok(pipeline)
    }

    /// Use `classifier` for relevance classification.
    pub fn with_classifier(mut self, classifier: Arc<dyn TextClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Use `embedder` for semantic similarity.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingService>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// The configuration the pipeline was built with.
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Provider ids in fan-out order.
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id().to_owned()).collect()
    }

    /// Run the pipeline with a wall-clock deadline.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run); an expired deadline is reported as
    /// [`DiscoveryError::Cancelled`].
    pub async fn run_with_deadline(
        &self,
        profile: &ClientProfile,
        deadline: Duration,
    ) -> Result<PipelineResult> {
        let cancel = CancellationToken::new();
        let guard = cancel.clone();
        tokio::select! {
            result = self.run(profile, cancel) => result,
            () = tokio::time::sleep(deadline) => {
                guard.cancel();
                Err(DiscoveryError::Cancelled(format!("deadline of {deadline:?} exceeded")))
            }
        }
    }

    /// Run every stage for `profile`.
    ///
    /// # Errors
    ///
    /// - [`DiscoveryError::InvalidInput`] for a malformed profile, before any
    ///   provider call
    /// - [`DiscoveryError::Cancelled`] when `cancel` fires; no partial result
    ///   is returned
    pub async fn run(&self, profile: &ClientProfile, cancel: CancellationToken) -> Result<PipelineResult> {
        let client_domain = profile.validate()?;
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("discovery_run", %run_id, client = %client_domain);
        self.run_stages(profile, client_domain, run_id, cancel)
            .instrument(span)
            .await
    }

    async fn run_stages(
        &self,
        profile: &ClientProfile,
        client_domain: String,
        run_id: Uuid,
        cancel: CancellationToken,
    ) -> Result<PipelineResult> {
        let config = &self.config;
        let started_at = Utc::now();

        // 1. Queries.
        let plan = stages::generate_queries(profile, &client_domain, &config.queries);
        ensure_active(&cancel, "query generation")?;

        // 2. Search fan-out.
        let options = FanOutOptions {
            max_in_flight: config.search.max_in_flight,
            call_timeout: Duration::from_secs(config.search.call_timeout_secs),
            per_provider_cap: config.search.per_provider_cap,
        };
        let texts = plan.selected_texts();
        let report = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(DiscoveryError::Cancelled("cancelled during search".into()));
            }
            report = search_all(&texts, &self.providers, &options) => report,
        };
        tracing::info!(
            queries = texts.len(),
            calls = report.calls,
            hits = report.hits.len(),
            failures = report.failures.len(),
            "search complete"
        );

        // 3. Deduplicate + prefilter.
        let groups = group_by_domain(&report.hits);
        let mut candidates = stages::deduplicate(groups, &client_domain, |id| report.tier_of(id));
        let total_found = candidates.len();
        stages::prefilter(&mut candidates, &self.prefilter);
        let total_evaluated = pending(&candidates);

        let limit = profile.max_results.min(config.final_filter.hard_cap);
        if total_evaluated == 0 {
            tracing::info!(total_found, "no candidates left after prefilter");
            return Ok(PipelineResult {
                run_id,
                client_domain,
                started_at,
                finished_at: Utc::now(),
                competitors: Vec::new(),
                all_candidates: candidates.iter().map(CandidateView::from).collect(),
                total_found,
                total_evaluated,
                no_candidates_found: true,
                queries_executed: plan.selected,
                thresholds: ThresholdReport::strict_only(
                    config.final_filter.min_combined,
                    config.final_filter.min_confidence,
                    limit,
                ),
                degraded: Vec::new(),
                provider_failures: report.failures,
            });
        }

        // 4. Enrichment.
        stages::enrich(
            &mut candidates,
            profile,
            self.fetcher.as_ref(),
            &config.enrichment,
            &cancel,
        )
        .await?;

        // 5. Cross-validation.
        stages::cross_validate(&mut candidates);
        ensure_active(&cancel, "cross-validation")?;

        // 6. Relevance.
        let mut degraded = stages::classify_relevance(
            &mut candidates,
            profile,
            self.classifier.as_deref(),
            &config.classifier,
            &cancel,
        )
        .await?;

        // 7. Similarity.
        degraded.extend(
            stages::score_similarity(
                &mut candidates,
                profile,
                &client_domain,
                self.embedder.as_deref(),
                &config.semantic,
                &cancel,
            )
            .await?,
        );

        // 8. Content validation.
        let vocabulary = run_vocabulary(profile, &config.enrichment);
        stages::validate_content(&mut candidates, &config.validation, &vocabulary);
        ensure_active(&cancel, "content validation")?;

        // 9-11. Ranking, diversity, final filter.
        let regions = client_regions(profile, &config.enrichment.known_regions, &config.queries);
        let ranking = stages::rank(&mut candidates, &regions, &config.ranking);
        stages::enforce_diversity(&mut candidates, &ranking, profile.max_results, &config.diversity);
        let (included, thresholds) =
            stages::final_filter(&mut candidates, &ranking, profile.max_results, &config.final_filter);
        ensure_active(&cancel, "final filter")?;

        debug_assert!(candidates.iter().all(|c| !c.is_pending()));
        debug_assert!(candidates.iter().all(|c| {
            (c.inclusion_status == InclusionStatus::Excluded) == c.exclusion_reason.is_some()
        }));

        let competitors: Vec<CandidateView> =
            included.iter().map(|&i| CandidateView::from(&candidates[i])).collect();
        tracing::info!(
            total_found,
            total_evaluated,
            competitors = competitors.len(),
            degraded = degraded.len(),
            "discovery run complete"
        );

        Ok(PipelineResult {
            run_id,
            client_domain,
            started_at,
            finished_at: Utc::now(),
            competitors,
            all_candidates: candidates.iter().map(CandidateView::from).collect(),
            total_found,
            total_evaluated,
            no_candidates_found: false,
            queries_executed: plan.selected,
            thresholds,
            degraded,
            provider_failures: report.failures,
        })
    }
}

impl std::fmt::Debug for CompetitorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompetitorPipeline")
            .field("providers", &self.provider_ids())
            .field("classifier", &self.classifier.as_ref().map(|c| c.name().to_owned()))
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_owned()))
            .finish_non_exhaustive()
    }
}

fn pending(candidates: &[Candidate]) -> usize {
    candidates.iter().filter(|c| c.is_pending()).count()
}

fn ensure_active(cancel: &CancellationToken, stage: &str) -> Result<()> {
    if cancel.is_cancelled() {
        Err(DiscoveryError::Cancelled(format!("cancelled after {stage}")))
    } else {
        Ok(())
    }
}

fn search_config(config: &DiscoveryConfig) -> SearchConfig {
    SearchConfig {
        max_results: config.search.per_provider_cap,
        timeout_seconds: config.search.call_timeout_secs,
        safe_search: config.search.safe_search,
        locale: config.search.locale.clone(),
        user_agent: config.search.user_agent.clone(),
    }
}

fn api_key(env_name: Option<&str>) -> Option<String> {
    let name = env_name?.trim();
    if name.is_empty() {
        return None;
    }
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn wrap(
    provider: Arc<dyn SearchProvider>,
    settings: &ProviderSettings,
    config: &DiscoveryConfig,
) -> Arc<dyn SearchProvider> {
    let guarded: Arc<dyn SearchProvider> = Arc::new(
        GuardedProvider::new(provider)
            .with_quota(settings.requests_per_minute, settings.burst)
            .with_breaker(CircuitBreakerConfig {
                failure_threshold: config.providers.breaker_failure_threshold,
                cooldown: Duration::from_secs(config.providers.breaker_cooldown_secs),
            }),
    );
    if config.search.cache_ttl_secs == 0 {
        return guarded;
    }
    Arc::new(CachedProvider::new(
        guarded,
        Duration::from_secs(config.search.cache_ttl_secs),
        config.search.cache_entries,
    ))
}

/// Build the enabled providers, each behind its quota, breaker and cache.
///
/// Brave is skipped with a warning when its key variable is unset.
///
/// # Errors
///
/// [`DiscoveryError::Config`] when no provider ends up enabled;
/// [`DiscoveryError::Search`] when a provider rejects its configuration.
pub fn build_providers(config: &DiscoveryConfig) -> Result<Vec<Arc<dyn SearchProvider>>> {
    let search = search_config(config);
    let settings = &config.providers;
    let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();

    if settings.brave.enabled {
        match api_key(settings.brave.api_key_env.as_deref()) {
            Some(key) => {
                let brave = BraveProvider::new(search.clone(), key)?;
                providers.push(wrap(Arc::new(brave), &settings.brave, config));
            }
            None => tracing::warn!(
                env = settings.brave.api_key_env.as_deref().unwrap_or_default(),
                "brave enabled but no API key set, skipping"
            ),
        }
    }
    if settings.duckduckgo.enabled {
        let ddg = DuckDuckGoProvider::new(search.clone())?;
        providers.push(wrap(Arc::new(ddg), &settings.duckduckgo, config));
    }
    if settings.bing.enabled {
        let bing = BingProvider::new(search)?;
        providers.push(wrap(Arc::new(bing), &settings.bing, config));
    }

    if providers.is_empty() {
        return Err(DiscoveryError::Config("no search provider is enabled".into()));
    }
    tracing::debug!(
        providers = ?providers.iter().map(|p| p.id().to_owned()).collect::<Vec<_>>(),
        "search providers ready"
    );
    Ok(providers)
}

fn build_classifier(config: &DiscoveryConfig) -> Option<Arc<dyn TextClassifier>> {
    let c = &config.classifier;
    if !c.enabled {
        return None;
    }
    let Some(key) = api_key(Some(c.api_key_env.as_str())) else {
        tracing::warn!(env = %c.api_key_env, "classifier API key not set, relevance will use the fallback score");
        return None;
    };
    let openai = OpenAiConfig::new(key, &c.model)
        .with_base_url(&c.base_url)
        .with_timeout(Duration::from_secs(c.timeout_secs));
    match OpenAiClassifier::new(openai) {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(e) => {
            tracing::warn!(error = %e, "classifier unavailable");
            None
        }
    }
}

fn build_embedder(config: &DiscoveryConfig) -> Option<Arc<dyn EmbeddingService>> {
    let s = &config.semantic;
    if !s.enabled {
        return None;
    }
    let Some(key) = api_key(Some(s.api_key_env.as_str())) else {
        tracing::warn!(env = %s.api_key_env, "embedding API key not set, similarity will default to 0");
        return None;
    };
    let openai = OpenAiConfig::new(key, &s.model)
        .with_base_url(&s.base_url)
        .with_timeout(Duration::from_secs(s.timeout_secs));
    match OpenAiEmbedder::new(openai) {
        Ok(embedder) => Some(Arc::new(embedder)),
        Err(e) => {
            tracing::warn!(error = %e, "embedder unavailable");
            None
        }
    }
}
