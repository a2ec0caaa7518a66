//! Circuit breaker for the resilient transport.
//!
//! - CLOSED: requests flow through
//! - OPEN: requests fail immediately without touching the network
//!
//! The circuit opens after `failure_threshold` consecutive failures and
//! closes again, with a zeroed counter, once `reset_timeout` has elapsed
//! since the last recorded failure. Any completed exchange resets the count.

use crate::config::NetworkConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Quiet period after the last failure before the circuit closes.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: NetworkConfig::CIRCUIT_BREAKER_THRESHOLD,
            reset_timeout: NetworkConfig::CIRCUIT_BREAKER_TIMEOUT,
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure: Option<Instant>,
    open: bool,
}

/// Failure counter and open flag shared by every request of one transport.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    total_failures: AtomicU64,
    total_successes: AtomicU64,
    name: String,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState::default()),
            total_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            name: name.into(),
        }
    }

    pub fn state(&self) -> CircuitState {
        let mut state = self.lock();
        self.maybe_close(&mut state);
        if state.open {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Whether a request may be sent now.
    pub fn allow_request(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Record a completed exchange.
    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state.open {
            info!("Circuit breaker for {} closed after success", self.name);
        }
        *state = BreakerState::default();
    }

    /// Record a transport error or retryable status.
    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure = Some(Instant::now());

        if !state.open && state.failure_count >= self.config.failure_threshold {
            state.open = true;
            warn!(
                "Circuit breaker for {} opened after {} failures",
                self.name, state.failure_count
            );
        } else {
            debug!(
                "Circuit breaker for {}: {} consecutive failures",
                self.name, state.failure_count
            );
        }
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let state = self.state();
        let guard = self.lock();
        CircuitBreakerStats {
            name: self.name.clone(),
            state,
            failure_count: guard.failure_count,
            total_failures: self.total_failures.load(Ordering::SeqCst),
            total_successes: self.total_successes.load(Ordering::SeqCst),
            since_last_failure: guard.last_failure.map(|t| t.elapsed()),
        }
    }

    /// Force the circuit closed.
    pub fn reset(&self) {
        *self.lock() = BreakerState::default();
        info!("Circuit breaker for {} reset to CLOSED", self.name);
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn maybe_close(&self, state: &mut BreakerState) {
        if !state.open {
            return;
        }
        let quiet = state
            .last_failure
            .map_or(true, |t| t.elapsed() >= self.config.reset_timeout);
        if quiet {
            *state = BreakerState::default();
            info!("Circuit breaker for {} reset to CLOSED after timeout", self.name);
        }
    }
}

/// Snapshot of a circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    pub since_last_failure: Option<Duration>,
}
