//! Resilient HTTP client.
//!
//! Wraps reqwest with:
//! - Retries with capped exponential backoff
//! - `Retry-After` aware handling of 429 responses
//! - A circuit breaker checked before the first attempt
//! - Rate limit tracking from `X-RateLimit-*` headers

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::retry::TransportConfig;
use crate::config::NetworkConfig;
use crate::error::{BinfetchError, Result};
use reqwest::{header, Client, Response, StatusCode};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Rate limit state extracted from response headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub limit: Option<u64>,
    /// Unix timestamp when the window resets.
    pub reset: Option<u64>,
}

impl RateLimitState {
    /// True when fewer than 10% of the window's requests remain.
    pub fn should_throttle(&self) -> bool {
        match (self.remaining, self.limit) {
            (Some(remaining), Some(limit)) if limit > 0 => {
                let threshold = (limit as f64 * 0.1) as u64;
                remaining < threshold.max(1)
            }
            _ => false,
        }
    }

    pub fn time_until_reset(&self) -> Option<Duration> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
        self.reset
            .filter(|reset| *reset > now)
            .map(|reset| Duration::from_secs(reset - now))
    }
}

/// HTTP GET client with retries, backoff and a circuit breaker.
///
/// One instance owns one circuit breaker. Share it behind an `Arc` to share
/// the breaker between callers.
pub struct ResilientClient {
    client: Client,
    config: TransportConfig,
    breaker: CircuitBreaker,
    rate_limit_remaining: AtomicI64,
    rate_limit_limit: AtomicU64,
    rate_limit_reset: AtomicU64,
}

impl ResilientClient {
    pub fn new(config: TransportConfig) -> Result<Self> {
        Self::with_breaker_config(config, CircuitBreakerConfig::default())
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(TransportConfig::default())
    }

    pub fn with_breaker_config(
        config: TransportConfig,
        breaker_config: CircuitBreakerConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| BinfetchError::Transport {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            config,
            breaker: CircuitBreaker::with_config("transport", breaker_config),
            rate_limit_remaining: AtomicI64::new(-1),
            rate_limit_limit: AtomicU64::new(0),
            rate_limit_reset: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn rate_limit_state(&self) -> RateLimitState {
        let remaining = self.rate_limit_remaining.load(Ordering::SeqCst);
        let limit = self.rate_limit_limit.load(Ordering::SeqCst);
        let reset = self.rate_limit_reset.load(Ordering::SeqCst);
        RateLimitState {
            remaining: u64::try_from(remaining).ok(),
            limit: (limit > 0).then_some(limit),
            reset: (reset > 0).then_some(reset),
        }
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        self.get_with_timeout(url, &[], self.config.timeout).await
    }

    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Response> {
        self.get_with_timeout(url, headers, self.config.timeout).await
    }

    /// GET with retries and a per-attempt timeout.
    ///
    /// Non-retryable responses (including 4xx) are returned as-is for the
    /// caller to interpret.
    pub async fn get_with_timeout(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<Response> {
        if self.config.circuit_breaker && !self.breaker.allow_request() {
            return Err(BinfetchError::CircuitOpen {
                domain: extract_domain(url),
            });
        }

        let attempts = self.config.max_attempts();
        let mut last_error = String::new();

        for attempt in 0..attempts {
            let is_last = attempt + 1 == attempts;
            self.maybe_throttle().await;

            let delay = match self.send_once(url, headers, timeout).await {
                Ok(response) => {
                    self.update_rate_limits(&response);
                    let status = response.status();

                    if !is_retryable_status(status) {
                        self.record_success();
                        if attempt > 0 {
                            debug!("GET {} succeeded after {} attempts", url, attempt + 1);
                        }
                        return Ok(response);
                    }

                    self.record_failure();
                    last_error = format!("HTTP {}", status);
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        self.config
                            .rate_limit_backoff(attempt, retry_after(&response))
                    } else {
                        self.config.backoff_delay(attempt)
                    }
                }
                Err(e) => {
                    self.record_failure();
                    last_error = e.to_string();
                    self.config.backoff_delay(attempt)
                }
            };

            if is_last {
                break;
            }

            warn!(
                "Attempt {}/{} for {} failed: {}. Retrying in {:?}",
                attempt + 1,
                attempts,
                url,
                last_error,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        warn!(
            "All {} attempts for {} exhausted. Last error: {}",
            attempts, url, last_error
        );
        Err(BinfetchError::MaxRetriesExceeded {
            attempts,
            last_error,
        })
    }

    async fn send_once(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<Response> {
        let mut request = self.client.get(url).timeout(timeout);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }
        request.send().await.map_err(|e| BinfetchError::Transport {
            message: format!("GET {} failed: {}", url, e),
            source: Some(e),
        })
    }

    fn record_success(&self) {
        if self.config.circuit_breaker {
            self.breaker.record_success();
        }
    }

    fn record_failure(&self) {
        if self.config.circuit_breaker {
            self.breaker.record_failure();
        }
    }

    async fn maybe_throttle(&self) {
        let state = self.rate_limit_state();
        if state.should_throttle() {
            warn!(
                "Rate limit approaching (remaining: {:?}/{:?}), throttling for {:?}",
                state.remaining,
                state.limit,
                NetworkConfig::RATE_LIMIT_THROTTLE
            );
            tokio::time::sleep(NetworkConfig::RATE_LIMIT_THROTTLE).await;
        }
    }

    fn update_rate_limits(&self, response: &Response) {
        let headers = response.headers();
        let read = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        if let Some(num) = read("X-RateLimit-Remaining").and_then(|v| v.parse::<i64>().ok()) {
            self.rate_limit_remaining.store(num, Ordering::SeqCst);
        }
        if let Some(num) = read("X-RateLimit-Limit").and_then(|v| v.parse::<u64>().ok()) {
            self.rate_limit_limit.store(num, Ordering::SeqCst);
        }
        if let Some(num) = read("X-RateLimit-Reset").and_then(|v| v.parse::<u64>().ok()) {
            self.rate_limit_reset.store(num, Ordering::SeqCst);
        }
    }
}

/// Statuses worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// `Retry-After` in seconds. HTTP-date values are ignored.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Host part of a URL, or `unknown`.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}
