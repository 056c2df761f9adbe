//! Landing-page enrichment of the top candidates.

use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use url::Url;

use rivalscope_search::{LandingPage, PageFetcher, SearchError};

use crate::candidate::{Candidate, EnrichmentData};
use crate::config::EnrichmentConfig;
use crate::error::{DiscoveryError, Result};
use crate::profile::ClientProfile;
use crate::stages::contains_term;

/// Counters for one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    /// Pages requested.
    pub attempted: usize,
    /// Pages fetched and summarised.
    pub enriched: usize,
    /// Pages skipped after fetch errors (documents, timeouts, HTTP errors).
    pub failed: usize,
    /// Fetches retried after a transient error.
    pub retried: usize,
}

/// Activity vocabulary for a run: configured terms plus the profile's keywords.
pub fn run_vocabulary(profile: &ClientProfile, config: &EnrichmentConfig) -> Vec<String> {
    let mut vocabulary: Vec<String> = Vec::new();
    for term in profile.keywords().iter().chain(&config.vocabulary) {
        let term = term.trim().to_lowercase();
        if !term.is_empty() && !vocabulary.contains(&term) {
            vocabulary.push(term);
        }
    }
    vocabulary
}

/// Landing URL for a result URL: same scheme and host, root path.
pub fn landing_url(result_url: &str) -> Option<String> {
    let mut url = Url::parse(result_url).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Fetch and summarise the landing pages of the best pending candidates.
///
/// Candidates are ranked by source score (discovery order breaks ties)
/// and the first `top_k` are fetched with at most `max_in_flight` requests
/// at once. A failed fetch leaves `enrichment` unset; it never excludes.
///
/// # Errors
///
/// [`DiscoveryError::Cancelled`] when `cancel` fires before all fetches settle.
pub async fn enrich(
    candidates: &mut [Candidate],
    profile: &ClientProfile,
    fetcher: &dyn PageFetcher,
    config: &EnrichmentConfig,
    cancel: &CancellationToken,
) -> Result<EnrichStats> {
    let vocabulary = run_vocabulary(profile, config);
    let timeout = Duration::from_secs(config.fetch_timeout_secs);

    let mut order: Vec<usize> = (0..candidates.len())
        .filter(|&i| candidates[i].is_pending())
        .collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .source_score
            .total_cmp(&candidates[a].source_score)
            .then(candidates[a].discovery_order.cmp(&candidates[b].discovery_order))
    });
    order.truncate(config.top_k);

    let jobs: Vec<(usize, String)> = order
        .into_iter()
        .filter_map(|i| landing_url(&candidates[i].url).map(|url| (i, url)))
        .collect();

    let mut stats = EnrichStats {
        attempted: jobs.len(),
        ..EnrichStats::default()
    };

    let fetches = stream::iter(jobs)
        .map(|(index, url)| async move {
            let (outcome, retried) =
                fetch_with_retry(fetcher, &url, timeout, config.retry_transient).await;
            (index, url, outcome, retried)
        })
        .buffer_unordered(config.max_in_flight.max(1))
        .collect::<Vec<_>>();

    let outcomes = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            return Err(DiscoveryError::Cancelled("cancelled during enrichment".into()));
        }
        outcomes = fetches => outcomes,
    };

    for (index, url, outcome, retried) in outcomes {
        if retried {
            stats.retried += 1;
        }
        match outcome {
            Ok(page) => {
                candidates[index].enrichment = Some(summarise(&page, &vocabulary, config));
                stats.enriched += 1;
            }
            Err(e) => {
                tracing::debug!(domain = %candidates[index].domain, url = %url, error = %e, "landing page skipped");
                stats.failed += 1;
            }
        }
    }

    tracing::info!(
        attempted = stats.attempted,
        enriched = stats.enriched,
        failed = stats.failed,
        retried = stats.retried,
        "enrichment complete"
    );
    Ok(stats)
}

async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &str,
    timeout: Duration,
    retry_transient: bool,
) -> (std::result::Result<LandingPage, SearchError>, bool) {
    let first = fetch_once(fetcher, url, timeout).await;
    match first {
        Err(e) if retry_transient && e.is_transient() => {
            tracing::debug!(url = %url, error = %e, "retrying landing page fetch");
            (fetch_once(fetcher, url, timeout).await, true)
        }
        other => (other, false),
    }
}

async fn fetch_once(
    fetcher: &dyn PageFetcher,
    url: &str,
    timeout: Duration,
) -> std::result::Result<LandingPage, SearchError> {
    match tokio::time::timeout(timeout, rivalscope_search::fetch_landing_page(fetcher, url, timeout))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(SearchError::Timeout(format!("{url} did not answer within {timeout:?}"))),
    }
}

/// Reduce an extracted page to the fields later stages use.
pub fn summarise(page: &LandingPage, vocabulary: &[String], config: &EnrichmentConfig) -> EnrichmentData {
    let text = page.text.to_lowercase();
    let headline = format!(
        "{} {} {}",
        page.title,
        page.description,
        page.service_phrases.join(" ")
    )
    .to_lowercase();

    let keywords: Vec<String> = vocabulary
        .iter()
        .filter(|term| contains_term(&headline, term) || contains_term(&text, term))
        .take(config.max_keywords)
        .cloned()
        .collect();

    let indicators: Vec<String> = config
        .indicator_phrases
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|phrase| {
            page.link_labels.iter().any(|label| contains_term(label, phrase))
                || contains_term(&text, phrase)
        })
        .collect();

    let regions: Vec<String> = config
        .known_regions
        .iter()
        .map(|r| r.trim().to_lowercase())
        .filter(|region| contains_term(&headline, region) || contains_term(&text, region))
        .collect();

    EnrichmentData {
        title: page.title.trim().to_owned(),
        description: truncate_words(page.description.trim(), config.max_description_chars),
        services: page
            .service_phrases
            .iter()
            .take(config.max_services)
            .cloned()
            .collect(),
        keywords,
        indicators,
        regions,
        text,
    }
}

/// Truncate to at most `max_chars` characters, backing off to a word boundary.
fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > max_chars / 2 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}…", trimmed.trim_end_matches([',', ';', ':', ' ']))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rivalscope_search::orchestrator::group_by_domain;
    use rivalscope_search::{FetchedPage, RawHit};

    use super::*;

    struct MapFetcher {
        pages: HashMap<String, std::result::Result<String, SearchError>>,
        calls: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new(pages: Vec<(&str, std::result::Result<&str, SearchError>)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(u, r)| (u.to_owned(), r.map(str::to_owned)))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls_for(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> rivalscope_search::Result<FetchedPage> {
            self.calls.lock().unwrap().push(url.to_owned());
            match self.pages.get(url) {
                Some(Ok(html)) => Ok(FetchedPage {
                    html: html.clone(),
                    status: 200,
                    content_type: Some("text/html".into()),
                    final_url: url.to_owned(),
                }),
                Some(Err(e)) => Err(e.clone()),
                None => Err(SearchError::Http(format!("{url}: 404"))),
            }
        }
    }

    const PAGE: &str = r#"<html><head><title>Strato Cloud</title>
        <meta name="description" content="Managed cloud hosting and Kubernetes migration for SMB teams in the United Kingdom.">
        </head><body>
        <h2>Our services</h2><ul><li>Cloud migration</li><li>Managed Kubernetes</li><li>24/7 support</li><li>Backups</li></ul>
        <p>Based in London. Contact us for a quote.</p>
        <a href="/contact">Contact</a><a href="mailto:hello@strato.example">Email</a>
        </body></html>"#;

    fn candidates(urls: &[&str]) -> Vec<Candidate> {
        let hits: Vec<RawHit> = urls
            .iter()
            .enumerate()
            .map(|(rank, url)| RawHit {
                source: "duckduckgo".into(),
                url: (*url).into(),
                title: String::new(),
                snippet: String::new(),
                rank,
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

    #[test]
    fn landing_url_is_site_root() {
        assert_eq!(
            landing_url("https://www.strato.example/pricing?plan=1#x").as_deref(),
            Some("https://www.strato.example/")
        );
        assert!(landing_url("ftp://strato.example/file").is_none());
    }

    #[test]
    fn vocabulary_puts_profile_keywords_first() {
        let vocabulary = run_vocabulary(&profile(), &EnrichmentConfig::default());
        assert_eq!(vocabulary[0], "cloud hosting");
        assert!(vocabulary.contains(&"migration".to_owned()));
    }

    #[tokio::test]
    async fn enriches_and_extracts_signals() {
        let fetcher = MapFetcher::new(vec![("https://strato.example/", Ok(PAGE))]);
        let mut cs = candidates(&["https://strato.example/pricing"]);
        let stats = enrich(
            &mut cs,
            &profile(),
            &fetcher,
            &EnrichmentConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(stats.enriched, 1);

        let data = cs[0].enrichment.as_ref().unwrap();
        assert_eq!(data.title, "Strato Cloud");
        assert!(data.description.starts_with("Managed cloud hosting"));
        assert_eq!(data.services.len(), 3);
        assert!(data.keywords.len() <= 5);
        assert_eq!(data.keywords[0], "cloud hosting");
        assert!(data.indicators.iter().any(|i| i == "contact"));
        assert!(data.indicators.iter().any(|i| i == "mailto"));
        assert!(data.regions.iter().any(|r| r == "london"));
        assert!(data.regions.iter().any(|r| r == "united kingdom"));
    }

    #[tokio::test]
    async fn failures_leave_enrichment_empty() {
        let fetcher = MapFetcher::new(vec![(
            "https://docs.example/",
            Err(SearchError::NotHtml("application/pdf".into())),
        )]);
        let mut cs = candidates(&["https://docs.example/", "https://gone.example/"]);
        let stats = enrich(
            &mut cs,
            &profile(),
            &fetcher,
            &EnrichmentConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(stats.failed, 2);
        assert!(cs.iter().all(|c| c.enrichment.is_none() && c.is_pending()));
        // NotHtml is not transient; the HTTP error is retried once.
        assert_eq!(fetcher.calls_for("https://docs.example/"), 1);
        assert_eq!(fetcher.calls_for("https://gone.example/"), 2);
        assert_eq!(stats.retried, 1);
    }

    #[tokio::test]
    async fn only_top_k_are_fetched() {
        let fetcher = MapFetcher::new(vec![
            ("https://a.example/", Ok(PAGE)),
            ("https://b.example/", Ok(PAGE)),
            ("https://c.example/", Ok(PAGE)),
        ]);
        let mut cs = candidates(&["https://a.example/", "https://b.example/", "https://c.example/"]);
        let config = EnrichmentConfig {
            top_k: 2,
            ..EnrichmentConfig::default()
        };
        enrich(&mut cs, &profile(), &fetcher, &config, &CancellationToken::new())
            .await
            .unwrap();
        assert!(cs[0].enrichment.is_some());
        assert!(cs[1].enrichment.is_some());
        assert!(cs[2].enrichment.is_none());
        assert_eq!(fetcher.calls_for("https://c.example/"), 0);
    }

    #[tokio::test]
    async fn cancellation_is_reported() {
        let fetcher = MapFetcher::new(vec![("https://a.example/", Ok(PAGE))]);
        let mut cs = candidates(&["https://a.example/"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = enrich(&mut cs, &profile(), &fetcher, &EnrichmentConfig::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Cancelled(_)));
    }

    #[test]
    fn indicators_match_whole_words_in_link_labels() {
        let page = LandingPage {
            title: "Grand Stay".into(),
            link_labels: vec!["hotels".into(), "telescopes".into(), "case studies".into()],
            ..LandingPage::default()
        };
        let data = summarise(&page, &[], &EnrichmentConfig::default());
        assert!(!data.indicators.iter().any(|i| i == "tel"), "{:?}", data.indicators);
        assert!(data.indicators.iter().any(|i| i == "case studies"));

        let page = LandingPage {
            link_labels: vec!["tel".into()],
            ..LandingPage::default()
        };
        let data = summarise(&page, &[], &EnrichmentConfig::default());
        assert_eq!(data.indicators, vec!["tel"]);
    }

    #[test]
    fn description_truncates_on_word_boundary() {
        let text = "alpha beta gamma delta epsilon";
        let out = truncate_words(text, 14);
        assert_eq!(out, "alpha beta…");
    }
}
