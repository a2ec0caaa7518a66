//! Network utilities for resilient HTTP operations.
//!
//! This module provides:
//! - Capped exponential backoff configuration
//! - Circuit breaker pattern for network resilience
//! - A retrying GET client with rate limiting awareness
//! - Streaming downloads with atomic placement

mod circuit_breaker;
mod client;
mod download;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use client::{extract_domain, is_retryable_status, RateLimitState, ResilientClient};
pub use download::DownloadManager;
pub use retry::TransportConfig;
