//! Circuit breaker for upstream services
//!
//! Opens after a run of consecutive failures, rejects calls until the reset
//! timeout elapses, then lets probe calls through in half-open state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::error::{Result, ServiceError};

use super::CircuitBreakerStatus;

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before the circuit opens
    pub failure_threshold: usize,

    /// Recovery timeout before allowing probe requests
    pub reset_timeout: Duration,

    /// Number of successful probes needed to close the circuit
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// A thread-safe circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    state: RwLock<BreakerState>,
    failure_count: AtomicUsize,
    success_count: AtomicUsize,
    total_failures: AtomicUsize,
    total_successes: AtomicUsize,
    config: CircuitBreakerConfig,
}

#[derive(Debug, Clone, Copy)]
struct BreakerState {
    status: CircuitBreakerStatus,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: RwLock::new(BreakerState {
                status: CircuitBreakerStatus::Closed,
                opened_at: None,
            }),
            failure_count: AtomicUsize::new(0),
            success_count: AtomicUsize::new(0),
            total_failures: AtomicUsize::new(0),
            total_successes: AtomicUsize::new(0),
            config,
        }
    }

    /// Check if the circuit allows a request
    pub fn check(&self) -> Result<()> {
        let state = self.snapshot();

        match state.status {
            CircuitBreakerStatus::Closed | CircuitBreakerStatus::HalfOpen => Ok(()),
            CircuitBreakerStatus::Open => {
                let elapsed = state.opened_at.map(|t| t.elapsed()).unwrap_or(self.config.reset_timeout);

                if elapsed >= self.config.reset_timeout {
                    self.transition_to_half_open();
                    Ok(())
                } else {
                    let remaining = self.config.reset_timeout.saturating_sub(elapsed);
                    Err(ServiceError::circuit_broken(format!(
                        "Circuit breaker is open, rejecting requests for {} more seconds",
                        remaining.as_secs()
                    )))
                }
            }
        }
    }

    /// Record a successful request
    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::SeqCst);

        match self.status() {
            CircuitBreakerStatus::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
            CircuitBreakerStatus::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    self.close_circuit();
                }
            }
            CircuitBreakerStatus::Open => {
                log::warn!("Received success in Open state, ignoring");
            }
        }
    }

    /// Record a failed request
    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::SeqCst);

        match self.status() {
            CircuitBreakerStatus::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    self.open_circuit();
                }
            }
            CircuitBreakerStatus::HalfOpen => self.open_circuit(),
            CircuitBreakerStatus::Open => {
                log::debug!("Received failure in Open state, ignoring");
            }
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        self.set_state(CircuitBreakerStatus::Closed, None);
        self.failure_count.store(0, Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        self.snapshot().status
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.snapshot();
        CircuitBreakerMetrics {
            status: state.status,
            failure_count: self.failure_count.load(Ordering::SeqCst),
            total_failures: self.total_failures.load(Ordering::SeqCst),
            total_successes: self.total_successes.load(Ordering::SeqCst),
            opened_duration: state.opened_at.map(|t| t.elapsed()),
        }
    }

    fn snapshot(&self) -> BreakerState {
        match self.state.read() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, status: CircuitBreakerStatus, opened_at: Option<Instant>) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.status = status;
        state.opened_at = opened_at;
    }

    fn open_circuit(&self) {
        log::warn!("Circuit breaker transitioning to Open state");
        self.set_state(CircuitBreakerStatus::Open, Some(Instant::now()));
        self.success_count.store(0, Ordering::SeqCst);
    }

    fn close_circuit(&self) {
        log::info!("Circuit breaker transitioning to Closed state");
        self.set_state(CircuitBreakerStatus::Closed, None);
        self.failure_count.store(0, Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
    }

    fn transition_to_half_open(&self) {
        log::info!("Circuit breaker transitioning to Half-Open state");
        let opened_at = self.snapshot().opened_at;
        self.set_state(CircuitBreakerStatus::HalfOpen, opened_at);
        self.success_count.store(0, Ordering::SeqCst);
    }
}

/// Metrics for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub status: CircuitBreakerStatus,
    pub failure_count: usize,
    pub total_failures: usize,
    pub total_successes: usize,

    /// Time since the circuit last opened, if it has
    pub opened_duration: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_circuit_opens_after_failures() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            ..CircuitBreakerConfig::default()
        });

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);

        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        let err = cb.check().unwrap_err();
        assert!(matches!(err, ServiceError::CircuitBroken(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_half_open_probe_closes_circuit() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_millis(50),
            success_threshold: 2,
        });

        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        thread::sleep(Duration::from_millis(80));
        assert!(cb.check().is_ok());
        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);

        cb.record_success();
        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);
        cb.record_success();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.metrics().total_successes, 2);
    }

    #[test]
    fn test_failure_in_half_open_reopens_circuit() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        cb.transition_to_half_open();

        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        cb.reset();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.metrics().failure_count, 0);
    }
}
