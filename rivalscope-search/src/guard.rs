//! Rate-limited, circuit-broken provider wrapper.
//!
//! Providers are shared read-only across concurrent pipeline runs, so the
//! per-provider request quota and health tracking live here rather than
//! in any single run. Uses the governor crate for quotas.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::engine::SearchProvider;
use crate::error::SearchError;
use crate::types::{ProviderTier, RawHit};

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Wraps a provider with a request quota and a circuit breaker.
///
/// - every call waits for a quota permit before reaching the inner provider;
///   [`search_within`](SearchProvider::search_within) starts its timeout only
///   once the permit is granted
/// - while the breaker is open, calls fail fast with [`SearchError::CircuitOpen`]
/// - rate-limit and transport failures count towards tripping the breaker
pub struct GuardedProvider {
    inner: Arc<dyn SearchProvider>,
    limiter: Option<Arc<DirectRateLimiter>>,
    breaker: Mutex<CircuitBreaker>,
}

impl GuardedProvider {
    /// Wrap `inner` with no quota and a default circuit breaker.
    pub fn new(inner: Arc<dyn SearchProvider>) -> Self {
        Self {
            inner,
            limiter: None,
            breaker: Mutex::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
        }
    }

    /// Limit the wrapped provider to `per_minute` requests with a burst of `burst`.
    ///
    /// A zero rate disables the quota; a zero burst is treated as 1.
    #[must_use]
    pub fn with_quota(mut self, per_minute: u32, burst: u32) -> Self {
        self.limiter = NonZeroU32::new(per_minute).map(|rate| {
            let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
            Arc::new(RateLimiter::direct(Quota::per_minute(rate).allow_burst(burst)))
        });
        self
    }

    /// Replace the circuit breaker configuration.
    #[must_use]
    pub fn with_breaker(self, config: CircuitBreakerConfig) -> Self {
        Self {
            breaker: Mutex::new(CircuitBreaker::new(config)),
            ..self
        }
    }

    /// Current breaker state (Closed when the lock is poisoned).
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker
            .lock()
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    fn should_attempt(&self) -> bool {
        self.breaker.lock().map_or(true, |mut b| b.should_attempt())
    }

    /// Fail fast on an open breaker, otherwise wait for a quota permit.
    async fn admit(&self) -> Result<(), SearchError> {
        if !self.should_attempt() {
            return Err(SearchError::CircuitOpen(format!(
                "{} temporarily disabled after repeated failures",
                self.inner.id()
            )));
        }
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        Ok(())
    }

    fn record(&self, outcome: &Result<Vec<RawHit>, SearchError>) {
        let Ok(mut breaker) = self.breaker.lock() else {
            return;
        };
        match outcome {
            Ok(_) => breaker.record_success(),
            Err(SearchError::Parse(_) | SearchError::Config(_)) => {}
            Err(_) => {
                breaker.record_failure();
                if breaker.state() == CircuitState::Open {
                    tracing::warn!(provider = self.inner.id(), "circuit opened");
                }
            }
        }
    }
}

#[async_trait]
impl SearchProvider for GuardedProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn tier(&self) -> ProviderTier {
        self.inner.tier()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawHit>, SearchError> {
        self.admit().await?;
        let outcome = self.inner.search(query, limit).await;
        self.record(&outcome);
        outcome
    }

    async fn search_within(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<RawHit>, SearchError> {
        self.admit().await?;
        let outcome = self.inner.search_within(query, limit, timeout).await;
        self.record(&outcome);
        outcome
    }
}
