//! Batch executor behavior: pacing, retry schedules, circuit breaking, and
//! full report coverage. All delays go to a recording sleeper, so these
//! tests run instantly while still asserting the exact waits that would
//! have been served.

mod common;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use costscope::core::executor::{
    BatchExecutor, CIRCUIT_BREAKER_REASON, ItemOutcome, PacingConfig,
};
use costscope::core::retry::RetryPolicy;
use costscope::remote::{RemoteError, RemoteResult};

use common::{RecordingSleeper, throttled};

fn executor(sleeper: &Arc<RecordingSleeper>) -> BatchExecutor {
    BatchExecutor::new(
        PacingConfig::default(),
        RetryPolicy::standard(),
        RetryPolicy::throttled(),
        3,
    )
    .with_sleeper(sleeper.clone())
}

/// An executor whose throttle schedule has no retries, so every throttled
/// call is a terminal item failure. Keeps breaker scenarios short.
fn no_retry_executor(sleeper: &Arc<RecordingSleeper>) -> BatchExecutor {
    BatchExecutor::new(
        PacingConfig::default(),
        RetryPolicy::standard(),
        RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_secs(15),
            max_delay: Duration::from_secs(120),
            jitter: false,
        },
        3,
    )
    .with_sleeper(sleeper.clone())
}

/// A call stub that pops one scripted result per invocation and counts
/// invocations.
fn scripted(
    results: Vec<RemoteResult<u32>>,
    calls: Arc<AtomicUsize>,
) -> impl FnMut(&u32) -> BoxFuture<'static, RemoteResult<u32>> {
    let queue = Arc::new(Mutex::new(VecDeque::from(results)));
    move |_| {
        let queue = Arc::clone(&queue);
        let calls = Arc::clone(&calls);
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            queue
                .lock()
                .unwrap()
                .pop_front()
                .expect("call script exhausted")
        })
    }
}

// =============================================================================
// Report Coverage
// =============================================================================

#[tokio::test]
async fn every_item_appears_exactly_once_in_the_report() {
    let sleeper = RecordingSleeper::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let script = scripted(
        vec![
            Ok(10),
            Err(RemoteError::with_status(404, "missing")),
            Ok(30),
        ],
        Arc::clone(&calls),
    );

    let report = executor(&sleeper).run(vec![1u32, 2, 3], script).await;

    assert!(!report.aborted);
    assert_eq!(report.outcomes.len(), 3);
    let items: Vec<u32> = report.outcomes.iter().map(|entry| entry.item).collect();
    assert_eq!(items, vec![1, 2, 3]);

    assert!(matches!(report.outcomes[0].outcome, ItemOutcome::Success(10)));
    assert!(matches!(
        report.outcomes[1].outcome,
        ItemOutcome::Error { status: Some(404), .. }
    ));
    assert!(matches!(report.outcomes[2].outcome, ItemOutcome::Success(30)));
    assert_eq!(report.success_count(), 2);
}

#[tokio::test]
async fn pacing_delays_grow_linearly_and_skip_item_zero() {
    let sleeper = RecordingSleeper::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let script = scripted(vec![Ok(1), Ok(2), Ok(3), Ok(4)], Arc::clone(&calls));

    let report = executor(&sleeper).run(vec![0u32, 1, 2, 3], script).await;

    assert_eq!(report.success_count(), 4);
    // Only pacing waits: item 0 has none, then 2.5s, 3.0s, 3.5s.
    assert_eq!(
        sleeper.recorded(),
        vec![
            Duration::from_millis(2500),
            Duration::from_millis(3000),
            Duration::from_millis(3500),
        ]
    );
}

// =============================================================================
// Circuit Breaker
// =============================================================================

#[tokio::test]
async fn breaker_stops_all_calls_after_consecutive_throttled_items() {
    let sleeper = RecordingSleeper::new();
    let calls = Arc::new(AtomicUsize::new(0));
    // Every call is throttled and the throttle schedule has no retries, so
    // the third item's failure trips the breaker.
    let script = scripted(
        vec![Err(throttled()), Err(throttled()), Err(throttled())],
        Arc::clone(&calls),
    );

    let report = no_retry_executor(&sleeper)
        .run(vec![1u32, 2, 3, 4, 5], script)
        .await;

    assert!(report.aborted);
    assert_eq!(report.consecutive_throttles, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3, "no calls after the trip");

    assert_eq!(report.outcomes.len(), 5);
    for entry in &report.outcomes[..3] {
        assert!(matches!(
            entry.outcome,
            ItemOutcome::Error { status: Some(429), .. }
        ));
        assert_eq!(entry.attempts, 1);
    }
    for entry in &report.outcomes[3..] {
        match &entry.outcome {
            ItemOutcome::Skipped { reason } => {
                assert_eq!(reason, CIRCUIT_BREAKER_REASON);
                assert_eq!(entry.attempts, 0);
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn successful_item_resets_the_throttle_counter() {
    let sleeper = RecordingSleeper::new();
    let calls = Arc::new(AtomicUsize::new(0));
    // Outcome sequence across items: throttle, throttle, success, throttle,
    // throttle, throttle. Cumulative counting would trip on item 4; with the
    // reset the breaker trips only on item 6.
    let script = scripted(
        vec![
            Err(throttled()),
            Err(throttled()),
            Ok(11),
            Err(throttled()),
            Err(throttled()),
            Err(throttled()),
        ],
        Arc::clone(&calls),
    );

    let report = no_retry_executor(&sleeper)
        .run(vec![1u32, 2, 3, 4, 5, 6, 7], script)
        .await;

    assert!(report.aborted);
    assert_eq!(calls.load(Ordering::SeqCst), 6);

    assert!(matches!(report.outcomes[2].outcome, ItemOutcome::Success(11)));
    for index in [0usize, 1, 3, 4, 5] {
        assert!(
            matches!(
                report.outcomes[index].outcome,
                ItemOutcome::Error { status: Some(429), .. }
            ),
            "item {index} should be a throttled error"
        );
    }
    assert!(matches!(
        report.outcomes[6].outcome,
        ItemOutcome::Skipped { .. }
    ));
}

#[tokio::test]
async fn exhausted_throttle_retries_do_not_stop_later_items() {
    let sleeper = RecordingSleeper::new();
    let calls = Arc::new(AtomicUsize::new(0));
    // Item 2 burns the full steep schedule (1 attempt + 5 retries) and still
    // fails; items 1 and 3 succeed. One throttled item is far below the
    // threshold, so the run completes.
    let script = scripted(
        vec![
            Ok(1),
            Err(throttled()),
            Err(throttled()),
            Err(throttled()),
            Err(throttled()),
            Err(throttled()),
            Err(throttled()),
            Ok(3),
        ],
        Arc::clone(&calls),
    );

    let report = executor(&sleeper).run(vec![1u32, 2, 3], script).await;

    assert!(!report.aborted);
    assert_eq!(calls.load(Ordering::SeqCst), 8);
    assert!(matches!(report.outcomes[0].outcome, ItemOutcome::Success(1)));
    assert!(matches!(
        report.outcomes[1].outcome,
        ItemOutcome::Error { status: Some(429), .. }
    ));
    assert_eq!(report.outcomes[1].attempts, 6);
    assert!(matches!(report.outcomes[2].outcome, ItemOutcome::Success(3)));
    // Success on item 3 resets the counter.
    assert_eq!(report.consecutive_throttles, 0);

    // Item 2's backoffs follow the steep schedule exactly.
    let sleeps = sleeper.recorded();
    let steep: Vec<Duration> = sleeps
        .iter()
        .copied()
        .filter(|d| *d >= Duration::from_secs(15))
        .collect();
    assert_eq!(
        steep,
        vec![
            Duration::from_secs(15),
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_secs(120),
            Duration::from_secs(120),
        ]
    );
}

// =============================================================================
// Retry Schedules
// =============================================================================

#[tokio::test]
async fn transient_errors_use_the_standard_schedule() {
    let sleeper = RecordingSleeper::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let script = scripted(
        vec![
            Err(RemoteError::with_status(503, "unavailable")),
            Err(RemoteError::with_status(500, "boom")),
            Ok(7),
        ],
        Arc::clone(&calls),
    );

    let report = executor(&sleeper).run(vec![1u32], script).await;

    assert!(matches!(report.outcomes[0].outcome, ItemOutcome::Success(7)));
    assert_eq!(report.outcomes[0].attempts, 3);
    assert_eq!(report.consecutive_throttles, 0);

    // Two backoff waits with jitter: [1s, 2s) then [2s, 3s).
    let sleeps = sleeper.recorded();
    assert_eq!(sleeps.len(), 2);
    assert!(sleeps[0] >= Duration::from_secs(1) && sleeps[0] <= Duration::from_secs(2));
    assert!(sleeps[1] >= Duration::from_secs(2) && sleeps[1] <= Duration::from_secs(3));
}

#[tokio::test]
async fn non_retryable_errors_fail_after_one_attempt() {
    let sleeper = RecordingSleeper::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let script = scripted(
        vec![Err(RemoteError::with_status(403, "forbidden"))],
        Arc::clone(&calls),
    );

    let report = executor(&sleeper).run(vec![1u32], script).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.outcomes[0].attempts, 1);
    assert!(sleeper.recorded().is_empty());
    assert!(!report.aborted);
    assert_eq!(report.consecutive_throttles, 0);
}

// =============================================================================
// Single-Call Retry
// =============================================================================

#[tokio::test]
async fn call_with_retry_walks_the_throttle_schedule() {
    let sleeper = RecordingSleeper::new();
    let queue = Arc::new(Mutex::new(VecDeque::from(vec![
        Err(throttled()),
        Err(throttled()),
        Err(throttled()),
        Err(throttled()),
        Err(throttled()),
        Ok(42u32),
    ])));

    let result = executor(&sleeper)
        .call_with_retry(move || {
            let queue = Arc::clone(&queue);
            Box::pin(async move { queue.lock().unwrap().pop_front().unwrap() })
        })
        .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(
        sleeper.recorded(),
        vec![
            Duration::from_secs(15),
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_secs(120),
            Duration::from_secs(120),
        ]
    );
}

#[tokio::test]
async fn call_with_retry_surfaces_the_last_error() {
    let sleeper = RecordingSleeper::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_in = Arc::clone(&calls);
    let result: RemoteResult<u32> = executor(&sleeper)
        .call_with_retry(move || {
            let calls = Arc::clone(&calls_in);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::with_status(500, "boom"))
            })
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.status, Some(500));
    // Initial attempt plus three standard retries.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
