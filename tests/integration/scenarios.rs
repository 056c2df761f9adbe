//! End-to-end pipeline runs against scripted providers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rivalscope::result::DegradedStage;
use rivalscope::{
    BusinessCategory, ClientProfile, DiscoveryError, InclusionStatus, RelevanceLabel,
};
use rivalscope_search::SearchProvider;
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

#[tokio::test]
async fn overlapping_providers_merge_into_unique_candidates() {
    let a_hits = hosting_hits("stratus", 40);
    let mut b_hits: Vec<HitSpec> = a_hits[..12].to_vec();
    b_hits.extend(hosting_hits("nimbus", 13));
    assert_eq!(b_hits.len(), 25);

    let providers: Vec<Arc<dyn SearchProvider>> = vec![
        Arc::new(ScriptedProvider::new("duckduckgo", a_hits)),
        Arc::new(ScriptedProvider::new("brave", b_hits).premium()),
    ];
    let pipeline = pipeline(config(), providers, MapFetcher::default())
        .with_classifier(Arc::new(FnClassifier::new(hosting_score)))
        .with_embedder(Arc::new(TopicEmbedder));

    let result = pipeline.run(&profile(), CancellationToken::new()).await.unwrap();

    assert_invariants(&result);
    assert_eq!(result.total_found, 53);
    assert_eq!(result.total_evaluated, 53);
    assert_eq!(result.all_candidates.len(), 53);
    assert!(!result.no_candidates_found);
    assert!(result.degraded.is_empty());
    assert_eq!(result.competitors.len(), 10);
    // The twelve domains both providers returned are cross-validated and
    // outrank everything else.
    for view in &result.competitors {
        assert_eq!(view.sources.len(), 2, "{} should be cross-validated", view.domain);
        assert_eq!(view.relevance_label, Some(RelevanceLabel::Direct));
    }
}

#[tokio::test]
async fn classifier_outage_falls_back_to_neutral_relevance() {
    // late.example is discovered after every duckduckgo hit but sits at the
    // top of its own provider's results.
    let providers: Vec<Arc<dyn SearchProvider>> = vec![
        Arc::new(ScriptedProvider::new("duckduckgo", hosting_hits("stratus", 15))),
        Arc::new(ScriptedProvider::new(
            "bing",
            vec![hit("late.example", "Managed cloud hosting for growing teams")],
        )),
    ];
    let pipeline = pipeline(config(), providers, MapFetcher::default())
        .with_classifier(Arc::new(DownClassifier))
        .with_embedder(Arc::new(TopicEmbedder));

    let result = pipeline.run(&profile(), CancellationToken::new()).await.unwrap();

    assert_invariants(&result);
    for view in &result.all_candidates {
        assert_eq!(view.relevance_score, Some(0.6));
        assert_eq!(view.relevance_label, Some(RelevanceLabel::Indirect));
    }
    let events: Vec<_> = result
        .degraded
        .iter()
        .filter(|e| e.stage == DegradedStage::Classification)
        .collect();
    // One event per failed batch of ten.
    assert_eq!(events.len(), 2);
    assert_eq!(events.iter().map(|e| e.domains.len()).sum::<usize>(), 16);
    assert!(events.iter().all(|e| e.detail.contains("connection refused")));

    // Without relevance scores the order follows raw source rank.
    let order: Vec<&str> = result.competitors.iter().map(|v| v.domain.as_str()).collect();
    assert!(order.len() >= 3, "{order:?}");
    assert_eq!(&order[..3], &["stratus0.example", "late.example", "stratus1.example"]);
}

#[tokio::test]
async fn missing_capabilities_still_complete() {
    let providers: Vec<Arc<dyn SearchProvider>> =
        vec![Arc::new(ScriptedProvider::new("duckduckgo", hosting_hits("stratus", 6)))];
    let pipeline = pipeline(config(), providers, MapFetcher::default());

    let result = pipeline.run(&profile(), CancellationToken::new()).await.unwrap();

    assert_invariants(&result);
    let stages: Vec<DegradedStage> = result.degraded.iter().map(|e| e.stage).collect();
    assert!(stages.contains(&DegradedStage::Classification));
    for view in &result.all_candidates {
        assert_eq!(view.semantic_similarity, Some(0.0));
    }
}

#[tokio::test]
async fn timed_out_provider_calls_are_recorded_not_fatal() {
    let provider = ScriptedProvider::new("duckduckgo", hosting_hits("stratus", 12))
        .with_slow_calls(vec![3, 11, 22], Duration::from_secs(30));
    let providers: Vec<Arc<dyn SearchProvider>> = vec![Arc::new(provider)];
    let mut config = config();
    config.queries.max_generated = 60;
    config.queries.max_executed = 30;
    let pipeline = pipeline(config, providers, MapFetcher::default())
        .with_classifier(Arc::new(FnClassifier::new(hosting_score)))
        .with_embedder(Arc::new(TopicEmbedder));

    let started = Instant::now();
    let result = pipeline.run(&profile(), CancellationToken::new()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_invariants(&result);
    assert_eq!(result.provider_failures.len(), 3);
    assert!(result.provider_failures.iter().all(|f| f.timed_out));
    assert_eq!(result.queries_executed.len(), 30);
    assert_eq!(result.total_found, 12);
    assert_eq!(result.competitors.len(), 10);
}

#[tokio::test]
async fn thresholds_relax_to_meet_the_minimum() {
    let hits: Vec<HitSpec> = (0..12)
        .map(|i| hit(&format!("cloudco{i}.example"), "Managed cloud services for teams"))
        .collect();
    let providers: Vec<Arc<dyn SearchProvider>> =
        vec![Arc::new(ScriptedProvider::new("duckduckgo", hits))];
    let pipeline = pipeline(config(), providers, MapFetcher::default())
        .with_classifier(Arc::new(FnClassifier::new(|_| 0.5)))
        .with_embedder(Arc::new(TopicEmbedder));

    let result = pipeline.run(&profile(), CancellationToken::new()).await.unwrap();

    assert_invariants(&result);
    assert_eq!(result.competitors.len(), 10);
    assert!(result.thresholds.relaxation_steps > 0);
    assert!(result.thresholds.applied_combined < result.thresholds.strict_combined);
    assert!(!result.thresholds.deferred_admitted);
    for view in &result.competitors {
        let rule = view.inclusion_rule.as_deref().unwrap();
        assert!(rule.starts_with("relaxed"), "unexpected rule {rule}");
    }
    let limited = result
        .all_candidates
        .iter()
        .filter(|v| v.inclusion_status == InclusionStatus::Excluded)
        .count();
    assert_eq!(limited, 2);
}

#[tokio::test]
async fn diversity_cap_spreads_results_across_categories() {
    let flavours = [
        "Certified cloud hosting integrator",
        "Cloud hosting agency for brands",
        "Cloud hosting consulting firm",
        "Freelance cloud hosting engineer",
        "Cloud hosting SaaS",
    ];
    let mut hits = Vec::new();
    for (f, snippet) in flavours.iter().enumerate() {
        for i in 0..4 {
            hits.push(hit(&format!("c{f}x{i}.example"), snippet));
        }
    }
    let providers: Vec<Arc<dyn SearchProvider>> =
        vec![Arc::new(ScriptedProvider::new("duckduckgo", hits))];
    let pipeline = pipeline(config(), providers, MapFetcher::default())
        .with_classifier(Arc::new(FnClassifier::new(hosting_score)))
        .with_embedder(Arc::new(TopicEmbedder));

    let result = pipeline.run(&profile(), CancellationToken::new()).await.unwrap();

    assert_invariants(&result);
    assert_eq!(result.competitors.len(), 10);
    let mut per_category: BTreeMap<BusinessCategory, usize> = BTreeMap::new();
    for view in &result.competitors {
        *per_category.entry(view.business_category.unwrap()).or_default() += 1;
    }
    assert_eq!(per_category.len(), 5);
    assert!(per_category.values().all(|&n| n == 2), "{per_category:?}");

    let capped = result
        .all_candidates
        .iter()
        .filter(|v| {
            v.exclusion_reason
                .as_deref()
                .is_some_and(|r| r.starts_with("diversity cap"))
        })
        .count();
    assert_eq!(capped, 10);
}

#[tokio::test]
async fn client_and_noise_are_excluded_with_reasons() {
    let mut hits = hosting_hits("stratus", 5);
    hits.push(hit("www.acme-hosting.example", "Our own cloud hosting"));
    hits.push(hit("blog.acme-hosting.example", "Cloud hosting tips"));
    hits.push(hit("www.linkedin.com", "Cloud hosting companies"));
    hits.push(hit("dailyhostingnews.example", "Cloud hosting industry"));
    hits.push(hit("furniture.example", "Office chairs and desks"));
    hits.push((
        "https://paper.example/whitepaper.pdf".into(),
        "Cloud hosting whitepaper".into(),
        "Download".into(),
    ));
    let providers: Vec<Arc<dyn SearchProvider>> =
        vec![Arc::new(ScriptedProvider::new("duckduckgo", hits))];
    let fetcher = MapFetcher::default().with_page(
        "stratus0.example",
        "<html><head><title>Stratus Hosting | Managed Cloud</title>\
         <meta name=\"description\" content=\"Managed cloud hosting for growing teams.\"></head>\
         <body><h1>Managed cloud hosting</h1><a href=\"/contact\">Contact us</a></body></html>",
    );
    let pipeline = pipeline(config(), providers, fetcher)
        .with_classifier(Arc::new(FnClassifier::new(hosting_score)))
        .with_embedder(Arc::new(TopicEmbedder));

    let result = pipeline.run(&profile(), CancellationToken::new()).await.unwrap();

    assert_invariants(&result);
    assert_eq!(result.total_found, 9);
    assert_eq!(result.total_evaluated, 7);

    let reason = |domain: &str| {
        result
            .candidate(domain)
            .and_then(|v| v.exclusion_reason.clone())
            .unwrap_or_default()
    };
    assert!(reason("linkedin.com").contains("directory"));
    assert!(reason("paper.example").contains("document"));
    assert!(reason("dailyhostingnews.example").contains("media"));
    assert!(!reason("furniture.example").is_empty());

    let enriched = result.candidate("stratus0.example").unwrap();
    assert!(enriched.title.contains("Stratus Hosting"), "title was {}", enriched.title);
    assert_eq!(result.competitor_domains().len(), 5);
}

#[tokio::test]
async fn nothing_left_after_prefilter_is_reported() {
    let hits = vec![
        hit("www.acme-hosting.example", "Our own site"),
        hit("www.trustpilot.com", "Reviews of cloud hosting"),
        hit("builtwith.com", "Technology lookup"),
    ];
    let providers: Vec<Arc<dyn SearchProvider>> =
        vec![Arc::new(ScriptedProvider::new("duckduckgo", hits))];
    let classifier = Arc::new(FnClassifier::new(hosting_score));
    let pipeline = pipeline(config(), providers, MapFetcher::default())
        .with_classifier(classifier.clone());

    let result = pipeline.run(&profile(), CancellationToken::new()).await.unwrap();

    assert_invariants(&result);
    assert!(result.no_candidates_found);
    assert!(result.competitors.is_empty());
    assert_eq!(result.total_found, 2);
    assert_eq!(result.total_evaluated, 0);
    assert_eq!(classifier.batches.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_profile_is_rejected_before_searching() {
    let provider = Arc::new(ScriptedProvider::new("duckduckgo", hosting_hits("stratus", 3)));
    let providers: Vec<Arc<dyn SearchProvider>> = vec![provider.clone()];
    let pipeline = pipeline(config(), providers, MapFetcher::default());

    let err = pipeline
        .run(&ClientProfile::new(CLIENT, vec![]), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidInput(_)), "got {err:?}");

    let err = pipeline
        .run(
            &ClientProfile::new("localhost", vec!["cloud hosting".into()]),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidInput(_)), "got {err:?}");
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn cancellation_during_search_stops_the_run() {
    let provider = ScriptedProvider::new("duckduckgo", hosting_hits("stratus", 5))
        .with_slow_calls((0..64).collect(), Duration::from_secs(60));
    let providers: Vec<Arc<dyn SearchProvider>> = vec![Arc::new(provider)];
    let mut config = config();
    config.search.call_timeout_secs = 120;
    let pipeline = pipeline(config, providers, MapFetcher::default());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = pipeline.run(&profile(), cancel).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::Cancelled(_)), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn pre_cancelled_token_returns_no_partial_result() {
    let providers: Vec<Arc<dyn SearchProvider>> =
        vec![Arc::new(ScriptedProvider::new("duckduckgo", hosting_hits("stratus", 5)))];
    let pipeline = pipeline(config(), providers, MapFetcher::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = pipeline.run(&profile(), cancel).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::Cancelled(_)));
}

#[tokio::test]
async fn deadline_expiry_is_a_cancellation() {
    let provider = ScriptedProvider::new("duckduckgo", hosting_hits("stratus", 5))
        .with_slow_calls((0..64).collect(), Duration::from_secs(60));
    let providers: Vec<Arc<dyn SearchProvider>> = vec![Arc::new(provider)];
    let mut config = config();
    config.search.call_timeout_secs = 120;
    let pipeline = pipeline(config, providers, MapFetcher::default());

    let err = pipeline
        .run_with_deadline(&profile(), Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Cancelled(_)), "got {err:?}");
}

#[tokio::test]
async fn concurrent_runs_share_one_pipeline() {
    let providers: Vec<Arc<dyn SearchProvider>> =
        vec![Arc::new(ScriptedProvider::new("duckduckgo", hosting_hits("stratus", 8)))];
    let pipeline = Arc::new(
        pipeline(config(), providers, MapFetcher::default())
            .with_classifier(Arc::new(FnClassifier::new(hosting_score)))
            .with_embedder(Arc::new(TopicEmbedder)),
    );

    let mut other = profile();
    other.client_domain = "stratus3.example".into();

    let base = profile();
    let (first, second) = tokio::join!(
        pipeline.run(&base, CancellationToken::new()),
        pipeline.run(&other, CancellationToken::new()),
    );
    let first = first.unwrap();
    let second = second.unwrap();
    assert_ne!(first.run_id, second.run_id);
    assert!(first.candidate("stratus3.example").is_some());
    assert!(second.candidate("stratus3.example").is_none());
    assert_eq!(second.total_found, 7);
}
