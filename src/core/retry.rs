//! Retry decision policy.
//!
//! [`RetryPolicy::decide`] is a pure function from (attempt count, error
//! class) to a wait-or-fail decision. It never sleeps and never logs;
//! callers apply the returned delay. That separation keeps the scheduling
//! decision independently testable without real delays.

use std::time::Duration;

use rand::Rng;

// =============================================================================
// Error Class
// =============================================================================

/// Classification of a remote failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// HTTP 429 — the remote is shedding load; back off steeply.
    RateLimited,
    /// HTTP 500/502/503/504 — transient server fault.
    ServerTransient,
    /// Everything else — not retryable.
    Other,
}

// =============================================================================
// Retry Decision
// =============================================================================

/// Outcome of a retry decision: whether to retry and how long to wait first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

impl RetryDecision {
    /// A terminal decision: do not retry.
    #[must_use]
    pub const fn give_up() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Exponential backoff schedule with an upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// First backoff delay; doubles on each subsequent attempt.
    pub base_delay: Duration,
    /// Ceiling applied after doubling (and jitter).
    pub max_delay: Duration,
    /// Whether to add up to one second of random jitter.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Standard schedule for transient server errors: 1s, 2s, 4s (+ jitter),
    /// capped at 60s, up to 3 retries.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }

    /// Steeper schedule for throttling responses: 15s, 30s, 60s, 120s,
    /// capped at 120s, up to 5 retries. No jitter; the delays are already
    /// long enough to desynchronize callers.
    #[must_use]
    pub const fn throttled() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(15),
            max_delay: Duration::from_secs(120),
            jitter: false,
        }
    }

    /// Decide whether a call that has already made `attempt` retries should
    /// be retried after classifying its latest failure as `error`.
    ///
    /// `Other` fails fast regardless of attempt count; retryable classes
    /// retry while `attempt < max_retries`.
    #[must_use]
    pub fn decide(&self, attempt: u32, error: ErrorClass) -> RetryDecision {
        if error == ErrorClass::Other || attempt >= self.max_retries {
            return RetryDecision::give_up();
        }

        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let delay = if self.jitter {
            exponential + Duration::from_secs_f64(rand::thread_rng().r#gen::<f64>())
        } else {
            exponential
        };

        RetryDecision {
            retry: true,
            delay: delay.min(self.max_delay),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_retries_once_attempts_exhausted() {
        for policy in [RetryPolicy::standard(), RetryPolicy::throttled()] {
            for class in [ErrorClass::RateLimited, ErrorClass::ServerTransient] {
                for attempt in policy.max_retries..policy.max_retries + 10 {
                    let decision = policy.decide(attempt, class);
                    assert!(
                        !decision.retry,
                        "attempt {attempt} must not retry with {class:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn other_errors_fail_fast() {
        let policy = RetryPolicy::standard();
        assert!(!policy.decide(0, ErrorClass::Other).retry);
    }

    #[test]
    fn standard_schedule_doubles_with_jitter_bound() {
        let policy = RetryPolicy::standard();
        for (attempt, base_secs) in [(0u32, 1u64), (1, 2), (2, 4)] {
            let decision = policy.decide(attempt, ErrorClass::ServerTransient);
            assert!(decision.retry);
            let min = Duration::from_secs(base_secs);
            let max = Duration::from_secs(base_secs + 1);
            assert!(
                decision.delay >= min && decision.delay <= max,
                "attempt {attempt}: {:?} outside [{min:?}, {max:?}]",
                decision.delay
            );
        }
    }

    #[test]
    fn throttled_schedule_is_deterministic_and_capped() {
        let policy = RetryPolicy::throttled();
        let expected = [15u64, 30, 60, 120, 120];
        for (attempt, secs) in expected.iter().enumerate() {
            let decision = policy.decide(u32::try_from(attempt).unwrap(), ErrorClass::RateLimited);
            assert!(decision.retry);
            assert_eq!(decision.delay, Duration::from_secs(*secs));
        }
        assert!(!policy.decide(5, ErrorClass::RateLimited).retry);
    }

    #[test]
    fn delay_respects_max_delay() {
        let policy = RetryPolicy {
            max_retries: 20,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: false,
        };
        let decision = policy.decide(10, ErrorClass::ServerTransient);
        assert_eq!(decision.delay, Duration::from_secs(60));
    }
}
