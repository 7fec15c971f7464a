//! Rate-limit-aware batch execution.
//!
//! Drives a sequence of per-item remote calls with inter-call pacing,
//! per-item retries via [`RetryPolicy`], and a circuit breaker that stops
//! issuing calls after sustained throttling. The executor knows nothing
//! about resource or cost semantics; both the resource collector (for
//! multi-subscription fan-out) and the cost aggregator (for per-resource
//! cost queries) run on top of it.
//!
//! All waiting goes through an injected [`Sleeper`], so tests can record
//! delays instead of serving them.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use super::retry::{ErrorClass, RetryPolicy};
use crate::remote::{RemoteError, RemoteResult};

/// Reason recorded on every item left unattempted after the breaker trips.
pub const CIRCUIT_BREAKER_REASON: &str = "circuit breaker: repeated throttling";

/// Consecutive throttled calls tolerated before the breaker trips.
pub const DEFAULT_MAX_CONSECUTIVE_THROTTLES: u32 = 3;

// =============================================================================
// Error Classification
// =============================================================================

/// Classify a remote failure for retry purposes.
///
/// Prefers the HTTP status when present. Some transports only surface an
/// error string; status marker text in the message is honored so callers can
/// pass raw remote errors without pre-classifying them.
#[must_use]
pub fn classify(error: &RemoteError) -> ErrorClass {
    if let Some(status) = error.status {
        return match status {
            429 => ErrorClass::RateLimited,
            500 | 502 | 503 | 504 => ErrorClass::ServerTransient,
            _ => ErrorClass::Other,
        };
    }

    let message = error.message.to_lowercase();
    if message.contains("429") || message.contains("too many requests") {
        ErrorClass::RateLimited
    } else if ["500", "502", "503", "504"]
        .iter()
        .any(|marker| message.contains(marker))
    {
        ErrorClass::ServerTransient
    } else {
        ErrorClass::Other
    }
}

// =============================================================================
// Sleeper
// =============================================================================

/// Abstraction over waiting, so pacing and backoff are testable without
/// real delays.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

// =============================================================================
// Pacing
// =============================================================================

/// Inter-call pacing: item `i > 0` waits `min(base + i * step, cap)` before
/// its first attempt; item 0 starts immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    pub base: Duration,
    pub step: Duration,
    pub cap: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            step: Duration::from_millis(500),
            cap: Duration::from_secs(10),
        }
    }
}

impl PacingConfig {
    /// Pre-call delay for the item at `index`.
    #[must_use]
    pub fn delay_for(&self, index: usize) -> Duration {
        if index == 0 {
            return Duration::ZERO;
        }
        let scaled = self
            .step
            .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
        (self.base + scaled).min(self.cap)
    }
}

// =============================================================================
// Batch Items and Reports
// =============================================================================

/// Terminal outcome of one batch item, set exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome<R> {
    /// The call succeeded.
    Success(R),
    /// The call failed and retries were exhausted or not applicable.
    Error {
        message: String,
        status: Option<u16>,
    },
    /// The item was never attempted.
    Skipped { reason: String },
}

impl<R> ItemOutcome<R> {
    /// Whether this outcome is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// One unit of work and its result.
#[derive(Debug, Clone)]
pub struct BatchItem<T, R> {
    /// The submitted work item.
    pub item: T,
    /// Number of calls made for this item (0 when skipped).
    pub attempts: u32,
    /// Terminal outcome.
    pub outcome: ItemOutcome<R>,
}

/// Per-batch aggregate covering every input item exactly once.
#[derive(Debug, Clone)]
pub struct ExecutionReport<T, R> {
    /// Outcomes in input order.
    pub outcomes: Vec<BatchItem<T, R>>,
    /// Final value of the consecutive-throttle counter.
    pub consecutive_throttles: u32,
    /// Once true, no further items were attempted.
    pub aborted: bool,
}

impl<T, R> ExecutionReport<T, R> {
    /// Number of successful items.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|entry| entry.outcome.is_success())
            .count()
    }
}

// =============================================================================
// Batch Executor
// =============================================================================

/// Sequential, paced, retrying batch driver with a throttle circuit breaker.
///
/// Calls are strictly serialized: the remote API enforces per-identity rate
/// limits, and overlapping calls would only trip them faster.
pub struct BatchExecutor {
    pacing: PacingConfig,
    transient: RetryPolicy,
    throttle: RetryPolicy,
    max_consecutive_throttles: u32,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new(
            PacingConfig::default(),
            RetryPolicy::standard(),
            RetryPolicy::throttled(),
            DEFAULT_MAX_CONSECUTIVE_THROTTLES,
        )
    }
}

impl BatchExecutor {
    /// Create an executor with explicit pacing, policies, and breaker
    /// threshold, using the tokio timer.
    #[must_use]
    pub fn new(
        pacing: PacingConfig,
        transient: RetryPolicy,
        throttle: RetryPolicy,
        max_consecutive_throttles: u32,
    ) -> Self {
        Self {
            pacing,
            transient,
            throttle,
            max_consecutive_throttles,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper. Tests inject a recording sleeper here.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Run every item through `call`, returning a report that covers each
    /// input exactly once as success, error, or skipped.
    ///
    /// Every item whose terminal outcome is a throttled failure increments
    /// the consecutive-throttle counter; a successful item resets it; other
    /// failures leave it untouched. When the counter reaches the threshold
    /// the run halts: the item that tripped it records its last error and
    /// every remaining item is reported skipped with
    /// [`CIRCUIT_BREAKER_REASON`]. No further remote calls occur after that
    /// point.
    pub async fn run<T, R, F>(&self, items: Vec<T>, mut call: F) -> ExecutionReport<T, R>
    where
        F: FnMut(&T) -> BoxFuture<'static, RemoteResult<R>>,
    {
        let total = items.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut consecutive_throttles = 0u32;
        let mut aborted = false;

        for (index, item) in items.into_iter().enumerate() {
            if aborted {
                outcomes.push(BatchItem {
                    item,
                    attempts: 0,
                    outcome: ItemOutcome::Skipped {
                        reason: CIRCUIT_BREAKER_REASON.to_string(),
                    },
                });
                continue;
            }

            let pace = self.pacing.delay_for(index);
            if !pace.is_zero() {
                tracing::debug!(
                    item = index + 1,
                    total,
                    delay_ms = u64::try_from(pace.as_millis()).unwrap_or(u64::MAX),
                    "pacing before next call"
                );
                self.sleeper.sleep(pace).await;
            }

            let mut attempt = 0u32;
            let outcome = loop {
                match call(&item).await {
                    Ok(value) => {
                        consecutive_throttles = 0;
                        break ItemOutcome::Success(value);
                    }
                    Err(err) => {
                        let class = classify(&err);
                        let policy = match class {
                            ErrorClass::RateLimited => &self.throttle,
                            _ => &self.transient,
                        };
                        let decision = policy.decide(attempt, class);

                        if decision.retry {
                            attempt += 1;
                            tracing::warn!(
                                item = index + 1,
                                total,
                                attempt,
                                delay_ms =
                                    u64::try_from(decision.delay.as_millis()).unwrap_or(u64::MAX),
                                error = %err,
                                "retrying after backoff"
                            );
                            self.sleeper.sleep(decision.delay).await;
                            continue;
                        }

                        tracing::warn!(
                            item = index + 1,
                            total,
                            attempts = attempt + 1,
                            error = %err,
                            "giving up on item"
                        );

                        if class == ErrorClass::RateLimited {
                            consecutive_throttles += 1;
                            if consecutive_throttles >= self.max_consecutive_throttles {
                                tracing::error!(
                                    item = index + 1,
                                    total,
                                    consecutive_throttles,
                                    "circuit breaker tripped; skipping remaining items"
                                );
                                aborted = true;
                            }
                        }

                        break ItemOutcome::Error {
                            message: err.to_string(),
                            status: err.status,
                        };
                    }
                }
            };

            outcomes.push(BatchItem {
                item,
                attempts: attempt + 1,
                outcome,
            });
        }

        ExecutionReport {
            outcomes,
            consecutive_throttles,
            aborted,
        }
    }

    /// Retry a single remote call with the same classification and policies
    /// as the batch path, without pacing or breaker involvement.
    ///
    /// Used for single-shot calls (aggregate cost queries, single-scope
    /// collection) so 429/5xx handling stays uniform across the crate.
    pub async fn call_with_retry<R, F>(&self, mut call: F) -> RemoteResult<R>
    where
        F: FnMut() -> BoxFuture<'static, RemoteResult<R>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let class = classify(&err);
                    let policy = match class {
                        ErrorClass::RateLimited => &self.throttle,
                        _ => &self.transient,
                    };
                    let decision = policy.decide(attempt, class);
                    if !decision.retry {
                        return Err(err);
                    }
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        delay_ms = u64::try_from(decision.delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "retrying call after backoff"
                    );
                    self.sleeper.sleep(decision.delay).await;
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
