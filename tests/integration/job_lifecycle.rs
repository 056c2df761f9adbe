//! Background job status, cancellation and failure reporting.

use std::sync::Arc;
use std::time::Duration;

use rivalscope::{ClientProfile, DiscoveryJob, JobStatus};
use rivalscope_search::SearchProvider;

use crate::helpers::*;

#[tokio::test]
async fn job_completes_with_result() {
    let providers: Vec<Arc<dyn SearchProvider>> =
        vec![Arc::new(ScriptedProvider::new("duckduckgo", hosting_hits("stratus", 6)))];
    let pipeline = Arc::new(
        pipeline(config(), providers, MapFetcher::default())
            .with_classifier(Arc::new(FnClassifier::new(hosting_score)))
            .with_embedder(Arc::new(TopicEmbedder)),
    );

    let job = DiscoveryJob::spawn(pipeline, profile());
    match job.wait().await {
        JobStatus::Completed(result) => {
            assert_invariants(&result);
            assert_eq!(result.competitors.len(), 6);
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_job_reports_cancelled() {
    let provider = ScriptedProvider::new("duckduckgo", hosting_hits("stratus", 6))
        .with_slow_calls((0..64).collect(), Duration::from_secs(60));
    let providers: Vec<Arc<dyn SearchProvider>> = vec![Arc::new(provider)];
    let mut config = config();
    config.search.call_timeout_secs = 120;
    let pipeline = Arc::new(pipeline(config, providers, MapFetcher::default()));

    let job = DiscoveryJob::spawn(pipeline, profile());
    assert!(matches!(job.status(), JobStatus::Running));
    tokio::time::sleep(Duration::from_millis(20)).await;
    job.cancel();

    let status = tokio::time::timeout(Duration::from_secs(5), job.wait())
        .await
        .expect("job settles after cancel");
    assert!(matches!(status, JobStatus::Cancelled), "got {status:?}");
}

#[tokio::test]
async fn invalid_profile_fails_the_job() {
    let providers: Vec<Arc<dyn SearchProvider>> =
        vec![Arc::new(ScriptedProvider::new("duckduckgo", hosting_hits("stratus", 3)))];
    let pipeline = Arc::new(pipeline(config(), providers, MapFetcher::default()));

    let job = DiscoveryJob::spawn(pipeline, ClientProfile::new(CLIENT, vec![]));
    match job.wait().await {
        JobStatus::Failed(message) => assert!(message.contains("invalid input")),
        other => panic!("expected failure, got {other:?}"),
    }
}
