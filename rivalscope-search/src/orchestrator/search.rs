//! Concurrent (query × provider) fan-out with bounded in-flight calls.
//!
//! Every pair is an independent call guarded by its own timeout, which
//! starts once the provider is ready to serve the call (after any quota
//! wait). A
//! failure or timeout contributes zero hits and is recorded as a
//! [`ProviderFailure`]; it never fails the whole fan-out.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::engine::SearchProvider;
use crate::error::SearchError;
use crate::types::{ProviderTier, RawHit};

/// Bounds applied to one fan-out.
#[derive(Debug, Clone)]
pub struct FanOutOptions {
    /// Maximum number of provider calls in flight at once.
    pub max_in_flight: usize,
    /// Time budget for a single provider call.
    pub call_timeout: Duration,
    /// Maximum hits kept per (query, provider) pair.
    pub per_provider_cap: usize,
}

impl Default for FanOutOptions {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            call_timeout: Duration::from_secs(10),
            per_provider_cap: 20,
        }
    }
}

/// A (query, provider) call that produced no hits because it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    /// Provider id.
    pub provider: String,
    /// Query text of the failed call.
    pub query: String,
    /// Human-readable error.
    pub error: String,
    /// Whether the call hit the per-call timeout.
    pub timed_out: bool,
}

/// Outcome of a fan-out.
#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    /// Hits in (query, provider, rank) order.
    pub hits: Vec<RawHit>,
    /// Failed calls in (query, provider) order.
    pub failures: Vec<ProviderFailure>,
    /// Number of (query, provider) calls issued.
    pub calls: usize,
    /// Tier of every provider that took part, keyed by id.
    pub tiers: BTreeMap<String, ProviderTier>,
}

impl SearchReport {
    /// Tier of a provider id seen in this fan-out.
    pub fn tier_of(&self, provider: &str) -> Option<ProviderTier> {
        self.tiers.get(provider).copied()
    }
}

/// Issue one search per (query × provider) pair and gather the results.
///
/// At most `options.max_in_flight` calls run at once. Output order is
/// deterministic regardless of completion order. Works with any number of
/// providers, including one; zero providers or queries yield an empty report.
pub async fn search_all(
    queries: &[String],
    providers: &[Arc<dyn SearchProvider>],
    options: &FanOutOptions,
) -> SearchReport {
    let tiers: BTreeMap<String, ProviderTier> = providers
        .iter()
        .map(|p| (p.id().to_owned(), p.tier()))
        .collect();

    let pairs: Vec<(usize, usize)> = (0..queries.len())
        .flat_map(|qi| (0..providers.len()).map(move |pi| (qi, pi)))
        .collect();
    let calls = pairs.len();

    let mut outcomes: Vec<(usize, usize, Result<Vec<RawHit>, SearchError>)> =
        stream::iter(pairs)
            .map(|(qi, pi)| {
                let provider = Arc::clone(&providers[pi]);
                let query = queries[qi].as_str();
                let timeout = options.call_timeout;
                let cap = options.per_provider_cap;
                async move {
                    tracing::trace!(provider = provider.id(), query, "provider call");
                    let outcome = provider.search_within(query, cap, timeout).await;
                    (qi, pi, outcome)
                }
            })
            .buffer_unordered(options.max_in_flight.max(1))
            .collect()
            .await;

    outcomes.sort_by_key(|(qi, pi, _)| (*qi, *pi));

    let mut report = SearchReport {
        calls,
        tiers,
        ..SearchReport::default()
    };

    for (qi, pi, outcome) in outcomes {
        let provider_id = providers[pi].id();
        let query = &queries[qi];
        match outcome {
            Ok(mut hits) => {
                hits.sort_by_key(|h| h.rank);
                hits.truncate(options.per_provider_cap);
                for hit in &mut hits {
                    hit.source = provider_id.to_owned();
                    hit.query.clone_from(query);
                }
                report.hits.extend(hits);
            }
            Err(err) => {
                tracing::warn!(provider = provider_id, error = %err, "provider call failed");
                report.failures.push(ProviderFailure {
                    provider: provider_id.to_owned(),
                    query: query.clone(),
                    error: err.to_string(),
                    timed_out: matches!(err, SearchError::Timeout(_)),
                });
            }
        }
    }

    tracing::debug!(
        calls = report.calls,
        hits = report.hits.len(),
        failures = report.failures.len(),
        "search fan-out complete"
    );
    report
}
