//! Resilience patterns for service clients
//!
//! This module provides:
//! - Retry with exponential backoff
//! - Circuit breaker
//! - A facade that composes both around a single upstream call

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics};
pub use retry::{RetryConfig, RetryExecutor};

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;

/// A unified resilience facade that composes multiple resilience strategies
#[derive(Clone)]
pub struct Resilience {
    retry: RetryExecutor,

    /// Shared so clones of a client trip the same breaker
    circuit_breaker: Arc<CircuitBreaker>,
}

impl Default for Resilience {
    fn default() -> Self {
        Self::new(RetryConfig::default(), CircuitBreakerConfig::default())
    }
}

impl Resilience {
    /// Create a new resilience facade with specified configurations
    pub fn new(retry_config: RetryConfig, circuit_breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            retry: RetryExecutor::new(retry_config),
            circuit_breaker: Arc::new(CircuitBreaker::new(circuit_breaker_config)),
        }
    }

    /// Execute a fallible operation behind the circuit breaker, retrying
    /// retryable failures. The breaker is consulted before every attempt.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cb = &self.circuit_breaker;
        self.retry
            .execute(|| {
                let attempt = cb.check().map(|_| operation());
                async move {
                    match attempt {
                        Err(open) => Err(open),
                        Ok(fut) => match fut.await {
                            Ok(value) => {
                                cb.record_success();
                                Ok(value)
                            }
                            Err(err) => {
                                // Caller mistakes (4xx) say nothing about upstream health
                                if err.is_retryable() {
                                    cb.record_failure();
                                }
                                Err(err)
                            }
                        },
                    }
                }
            })
            .await
    }

    /// Get the current status of the circuit breaker
    pub fn circuit_breaker_status(&self) -> CircuitBreakerStatus {
        self.circuit_breaker.status()
    }

    /// Reset the circuit breaker state
    pub fn reset_circuit_breaker(&self) {
        self.circuit_breaker.reset();
    }

    /// Replace the retry policy
    pub fn configure_retry(&mut self, config: RetryConfig) {
        self.retry = RetryExecutor::new(config);
    }

    /// Replace the circuit breaker
    pub fn configure_circuit_breaker(&mut self, config: CircuitBreakerConfig) {
        self.circuit_breaker = Arc::new(CircuitBreaker::new(config));
    }
}

/// Status of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerStatus {
    /// Circuit is closed, allowing requests
    Closed,

    /// Circuit is open, rejecting requests
    Open,

    /// Circuit is half-open, allowing a limited number of test requests
    HalfOpen,
}

impl std::fmt::Display for CircuitBreakerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}
