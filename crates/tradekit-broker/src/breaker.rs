//! Circuit breaker for broker outages.
//!
//! Repeated failures open the circuit; while open, every call is refused
//! immediately instead of waiting out another timeout against a dead
//! broker. The circuit closes again once the cooldown expires.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation, calls are allowed.
    Closed,
    /// Tripped, all calls refused until cooldown expires.
    Open { tripped_at: Instant },
}

/// Consecutive-failure circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    cooldown: Duration,
    consecutive_failures: Mutex<u32>,
    failure_threshold: u32,
}

impl CircuitBreaker {
    /// Create a breaker that trips after `failure_threshold` consecutive
    /// failures and stays open for `cooldown`.
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState::Closed),
            cooldown,
            consecutive_failures: Mutex::new(0),
            failure_threshold,
        }
    }

    /// Check if calls are currently allowed.
    pub fn is_allowed(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    *state = BreakerState::Closed;
                    *self.consecutive_failures.lock().unwrap() = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call, resetting the failure counter.
    pub fn record_success(&self) {
        *self.consecutive_failures.lock().unwrap() = 0;
    }

    /// Record a failure. Trips the breaker at the threshold.
    pub fn record_failure(&self) {
        let mut failures = self.consecutive_failures.lock().unwrap();
        *failures += 1;
        if *failures >= self.failure_threshold {
            *self.state.lock().unwrap() = BreakerState::Open {
                tripped_at: Instant::now(),
            };
        }
    }

    /// Immediately trip the breaker (auth revocation, hard ban).
    pub fn trip(&self) {
        *self.state.lock().unwrap() = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    /// Remaining cooldown time (zero if not tripped).
    pub fn remaining_cooldown(&self) -> Duration {
        let state = self.state.lock().unwrap();
        match *state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => {
                self.cooldown.saturating_sub(tripped_at.elapsed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));
        assert!(cb.is_allowed());
    }

    #[test]
    fn trips_after_threshold_failures() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_allowed());
        cb.record_failure();
        assert!(!cb.is_allowed());
    }

    #[test]
    fn immediate_trip() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));
        cb.trip();
        assert!(!cb.is_allowed());
        assert!(cb.remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn success_resets_counter() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert!(cb.is_allowed());
    }

    #[test]
    fn closes_after_cooldown() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(10));
        cb.record_failure();
        assert!(!cb.is_allowed());
        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.is_allowed());
    }
}
