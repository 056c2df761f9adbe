//! Per-provider circuit breaker.
//!
//! Tracks consecutive failures of one provider and temporarily stops
//! calling it after repeated failures. After a cooldown the breaker lets
//! a single probe through; its outcome closes or re-opens the circuit.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure              │
//!     └─────────────────────────┴──────────────────────┘
//! ```

use std::time::{Duration, Instant};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Provider is healthy; all requests are allowed through.
    Closed,
    /// Provider failed too many times; requests are blocked until cooldown expires.
    Open,
    /// Cooldown has elapsed; one probe request is allowed to test recovery.
    HalfOpen,
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before tripping the circuit to Open.
    pub failure_threshold: u32,
    /// Time to wait in Open state before transitioning to HalfOpen.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Health tracking for a single provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }

    /// Record a successful request; closes the circuit.
    pub fn record_success(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
    }

    /// Record a failed request; opens the circuit at the threshold.
    ///
    /// A failed half-open probe re-opens immediately.
    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(Instant::now());

        if self.state == CircuitState::HalfOpen
            || self.consecutive_failures >= self.config.failure_threshold
        {
            self.state = CircuitState::Open;
        }
    }

    /// Check whether a request should be attempted.
    ///
    /// - [`CircuitState::Closed`] / [`CircuitState::HalfOpen`]: `true`
    /// - [`CircuitState::Open`]: `true` only once the cooldown has elapsed,
    ///   which moves the breaker to [`CircuitState::HalfOpen`]
    pub fn should_attempt(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooldown_elapsed = self
                    .last_failure_at
                    .is_none_or(|t| t.elapsed() >= self.config.cooldown);
                if cooldown_elapsed {
                    self.state = CircuitState::HalfOpen;
                }
                cooldown_elapsed
            }
        }
    }

    /// Current circuit state.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Consecutive failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
