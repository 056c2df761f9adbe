//! Config persistence and provider wiring.

use rivalscope::{CompetitorPipeline, DiscoveryConfig, DiscoveryError, build_providers};

#[test]
fn config_survives_a_save_and_load() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("nested").join("config.toml");

    let mut config = DiscoveryConfig::default();
    config.final_filter.min_results = 5;
    config.diversity.cap_override = Some(3);
    config.providers.bing.enabled = true;
    config.save_to_file(&path).unwrap();

    let loaded = DiscoveryConfig::from_file(&path).unwrap();
    assert_eq!(loaded.final_filter.min_results, 5);
    assert_eq!(loaded.diversity.cap_override, Some(3));
    assert!(loaded.providers.bing.enabled);
    loaded.validate().unwrap();
}

#[test]
fn partial_config_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[final_filter]\nmin_results = 4\n").unwrap();

    let loaded = DiscoveryConfig::from_file(&path).unwrap();
    assert_eq!(loaded.final_filter.min_results, 4);
    assert_eq!(loaded.final_filter.hard_cap, DiscoveryConfig::default().final_filter.hard_cap);
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = DiscoveryConfig::default();
    config.ranking.geo = 0.5;
    let err = CompetitorPipeline::from_config(config).unwrap_err();
    assert!(matches!(err, DiscoveryError::Config(_)), "got {err:?}");
}

#[test]
fn brave_without_key_is_skipped() {
    let mut config = DiscoveryConfig::default();
    config.providers.brave.enabled = true;
    config.providers.brave.api_key_env = Some("RIVALSCOPE_TEST_UNSET_BRAVE_KEY".into());
    config.providers.duckduckgo.enabled = true;
    config.providers.bing.enabled = false;

    let providers = build_providers(&config).unwrap();
    let ids: Vec<&str> = providers.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec!["duckduckgo"]);
}

#[test]
fn no_enabled_provider_is_a_config_error() {
    let mut config = DiscoveryConfig::default();
    config.providers.brave.enabled = true;
    config.providers.brave.api_key_env = Some("RIVALSCOPE_TEST_UNSET_BRAVE_KEY".into());
    config.providers.duckduckgo.enabled = false;
    config.providers.bing.enabled = false;

    let Err(err) = build_providers(&config) else {
        panic!("expected build_providers to fail");
    };
    assert!(matches!(err, DiscoveryError::Config(_)), "got {err:?}");
}

#[tokio::test]
async fn pipeline_from_config_wires_free_providers() {
    let mut config = DiscoveryConfig::default();
    config.providers.bing.enabled = true;
    config.classifier.enabled = false;
    config.semantic.enabled = false;
    let pipeline = CompetitorPipeline::from_config(config).unwrap();
    let ids = pipeline.provider_ids();
    assert!(ids.contains(&"duckduckgo".to_owned()));
    assert!(ids.contains(&"bing".to_owned()));
}
