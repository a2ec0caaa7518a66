//! Transport configuration and backoff calculation.
//!
//! Delays grow exponentially from a base and are capped:
//! - generic failures start from `initial_delay`
//! - 429 responses honour `Retry-After`, else start from `rate_limit_delay`

use crate::config::NetworkConfig;
use std::time::Duration;

/// Configuration for the resilient transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff base for retryable failures.
    pub initial_delay: Duration,
    /// Cap for every backoff sleep.
    pub max_delay: Duration,
    /// Growth factor per attempt (typically 2.0).
    pub backoff_factor: f64,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Backoff base for 429 responses without `Retry-After`.
    pub rate_limit_delay: Duration,
    /// Whether the circuit breaker is consulted.
    pub circuit_breaker: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: NetworkConfig::MAX_RETRIES,
            initial_delay: NetworkConfig::INITIAL_RETRY_DELAY,
            max_delay: NetworkConfig::MAX_RETRY_DELAY,
            backoff_factor: NetworkConfig::BACKOFF_FACTOR,
            timeout: NetworkConfig::REQUEST_TIMEOUT,
            rate_limit_delay: NetworkConfig::RATE_LIMIT_DELAY,
            circuit_breaker: true,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    pub fn with_circuit_breaker(mut self, enabled: bool) -> Self {
        self.circuit_breaker = enabled;
        self
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sleep after a failed attempt (0-indexed): `initial × factor^attempt`, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.scaled(self.initial_delay, attempt)
    }

    /// Sleep after a 429. `Retry-After` wins when present; both are capped.
    pub fn rate_limit_backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(delay) => delay.min(self.max_delay),
            None => self.scaled(self.rate_limit_delay, attempt),
        }
    }

    fn scaled(&self, base: Duration, attempt: u32) -> Duration {
        let multiplier = self.backoff_factor.powi(attempt.min(i32::MAX as u32) as i32);
        let delay_secs = base.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());
        if capped_secs.is_finite() && capped_secs >= 0.0 {
            Duration::from_secs_f64(capped_secs)
        } else {
            self.max_delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.circuit_breaker);
        assert_eq!(config.max_attempts(), 4);
    }

    #[test]
    fn test_backoff_delay_calculation() {
        let config = TransportConfig::new().with_initial_delay(Duration::from_secs(1));

        // 1 * 2^0, 1 * 2^1, 1 * 2^2
        assert_eq!(config.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let config = TransportConfig::new()
            .with_initial_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(30));

        assert_eq!(config.backoff_delay(5), Duration::from_secs(30));
        assert_eq!(config.backoff_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_rate_limit_uses_retry_after() {
        let config = TransportConfig::new();
        assert_eq!(
            config.rate_limit_backoff(0, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            config.rate_limit_backoff(0, Some(Duration::from_secs(600))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_rate_limit_without_retry_after() {
        let config = TransportConfig::new()
            .with_rate_limit_delay(Duration::from_millis(500))
            .with_backoff_factor(3.0);
        assert_eq!(config.rate_limit_backoff(0, None), Duration::from_millis(500));
        assert_eq!(config.rate_limit_backoff(2, None), Duration::from_millis(4500));
    }
}
