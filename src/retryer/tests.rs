//! Behavior of the retry loop.

use super::*;
use crate::error::TimeoutError;
use crate::limiter::FixedTimeLimit;
use crate::stop::{StopAfterAttempt, StopAfterDelay};
use crate::testing::{FlakyOperation, TestFailure};
use crate::wait::{FibonacciWait, FixedWait, JoinWait};
use crate::{assert_exhausted, assert_execution_failed, Cancelled};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

/// None, then io error, then three plain failures, then a value.
fn bumpy_operation() -> FlakyOperation<Option<bool>> {
    FlakyOperation::new()
        .then_ok(None)
        .then_err(io::Error::other("connection refused"))
        .then_err(TestFailure::new("bad state"))
        .then_err(TestFailure::new("bad state"))
        .then_err(TestFailure::new("bad state"))
        .then_ok(Some(true))
}

fn all_conditions() -> RetryerBuilder<Option<bool>> {
    Retryer::builder()
        .retry_if_result(Option::is_none)
        .retry_if_exception_of_type::<io::Error>()
        .retry_if_exception()
}

#[test]
fn test_multiple_conditions_until_success() {
    let flaky = bumpy_operation();
    let result = all_conditions().build().call(flaky.operation());

    assert_eq!(result.unwrap(), Some(true));
    assert_eq!(flaky.calls(), 6);
}

#[test]
fn test_multiple_conditions_stop_after_three() {
    let flaky = bumpy_operation();
    let retryer = all_conditions()
        .with_stop_strategy(StopAfterAttempt::new(3).unwrap())
        .unwrap()
        .build();

    let exhausted = assert_exhausted!(retryer.call(flaky.operation()), 3);
    assert!(!exhausted.was_cancelled());
    assert_eq!(
        exhausted
            .last_failed_attempt()
            .exception_cause()
            .unwrap()
            .to_string(),
        "bad state"
    );
    assert_eq!(flaky.calls(), 3);
}

#[test]
fn test_no_conditions_accepts_first_attempt() {
    let flaky = bumpy_operation();
    let result = Retryer::builder().build().call(flaky.operation());

    assert_eq!(result.unwrap(), None);
    assert_eq!(flaky.calls(), 1);
}

#[test]
fn test_accepted_failure_is_execution_failed() {
    let retryer = Retryer::<Option<bool>>::builder()
        .retry_if_result(Option::is_none)
        .build();

    let err = assert_execution_failed!(
        retryer.call(|| Err::<Option<bool>, _>(io::Error::other("permission denied")))
    );
    let cause = err.cause().downcast_ref::<io::Error>().expect("io cause");
    assert_eq!(cause.to_string(), "permission denied");
}

#[test]
fn test_listener_sees_every_attempt_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = {
        let seen = Arc::clone(&seen);
        move |attempt: &Attempt<Option<bool>>| {
            seen.lock()
                .push((attempt.attempt_number(), attempt.has_exception()));
        }
    };

    let flaky = bumpy_operation();
    all_conditions()
        .with_retry_listener(recorder)
        .build()
        .call(flaky.operation())
        .unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            (1, false),
            (2, true),
            (3, true),
            (4, true),
            (5, true),
            (6, false)
        ]
    );
}

#[test]
fn test_listeners_run_in_registration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let first = {
        let order = Arc::clone(&order);
        move |_: &Attempt<u8>| order.lock().push("first")
    };
    let second = {
        let order = Arc::clone(&order);
        move |_: &Attempt<u8>| order.lock().push("second")
    };

    Retryer::builder()
        .with_retry_listener(first)
        .with_retry_listener(second)
        .build()
        .call(|| Ok::<_, io::Error>(1))
        .unwrap();

    assert_eq!(*order.lock(), vec!["first", "second"]);
}

#[test]
fn test_panicking_listener_is_isolated() {
    let notified = Arc::new(AtomicU32::new(0));
    let counter = {
        let notified = Arc::clone(&notified);
        move |_: &Attempt<Option<bool>>| {
            notified.fetch_add(1, Ordering::SeqCst);
        }
    };

    let flaky = bumpy_operation();
    let result = all_conditions()
        .with_retry_listener(|_: &Attempt<Option<bool>>| panic!("listener bug"))
        .with_retry_listener(counter)
        .build()
        .call(flaky.operation());

    assert_eq!(result.unwrap(), Some(true));
    assert_eq!(notified.load(Ordering::SeqCst), 6);
}

#[test]
fn test_block_strategy_receives_each_wait() {
    let blocks = Arc::new(Mutex::new(Vec::new()));
    let recorder = {
        let blocks = Arc::clone(&blocks);
        move |delay: Duration, _: &CancellationToken| -> Result<(), Cancelled> {
            blocks.lock().push(delay);
            Ok(())
        }
    };

    let flaky = bumpy_operation();
    let result = all_conditions()
        .with_wait_strategy(FixedWait::new(Duration::from_millis(1000)))
        .unwrap()
        .with_block_strategy(recorder)
        .unwrap()
        .build()
        .call(flaky.operation());

    assert_eq!(result.unwrap(), Some(true));
    assert_eq!(*blocks.lock(), vec![Duration::from_millis(1000); 5]);
}

#[test]
fn test_cancel_while_waiting() {
    let retryer = Retryer::<Option<bool>>::builder()
        .retry_if_result(Option::is_none)
        .with_wait_strategy(FixedWait::new(Duration::from_secs(1)))
        .unwrap()
        .build();

    let token = CancellationToken::new();
    let remote = token.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        remote.cancel();
    });

    let start = Instant::now();
    let exhausted = assert_exhausted!(retryer.call_with_cancel(|| Ok::<_, io::Error>(None), &token));
    canceller.join().unwrap();

    assert!(exhausted.was_cancelled());
    assert_eq!(exhausted.attempt_count(), 1);
    assert!(token.is_cancelled());
    assert!(start.elapsed() < Duration::from_millis(900));
}

#[test]
fn test_cancellation_overrides_remaining_attempts() {
    let retryer = Retryer::<Option<bool>>::builder()
        .retry_if_result(Option::is_none)
        .with_stop_strategy(StopAfterAttempt::new(100).unwrap())
        .unwrap()
        .build();

    let token = CancellationToken::new();
    token.cancel();

    let exhausted = assert_exhausted!(retryer.call_with_cancel(|| Ok::<_, io::Error>(None), &token));
    assert!(exhausted.was_cancelled());
    assert_eq!(exhausted.attempt_count(), 1);
}

#[test]
fn test_join_wait_delays_accumulate() {
    let join = JoinWait::<Option<bool>>::new(vec![
        Box::new(FixedWait::new(Duration::from_millis(50))),
        Box::new(FibonacciWait::new(Duration::from_millis(10), Duration::MAX).unwrap()),
    ])
    .unwrap();

    let flaky = FlakyOperation::new()
        .then_err(TestFailure::new("1"))
        .then_err(TestFailure::new("2"))
        .then_err(TestFailure::new("3"))
        .then_err(TestFailure::new("4"))
        .then_ok(Some(true));

    let start = Instant::now();
    let result = Retryer::builder()
        .retry_if_exception()
        .with_wait_strategy(join)
        .unwrap()
        .build()
        .call(flaky.operation());

    assert_eq!(result.unwrap(), Some(true));
    // (50 + 10) + (50 + 10) + (50 + 20) + (50 + 30)
    assert!(start.elapsed() >= Duration::from_millis(270));
}

#[test]
fn test_attempt_numbers_saturate_at_max() {
    assert_eq!(next_attempt_number(1), 2);
    assert_eq!(next_attempt_number(u32::MAX - 1), u32::MAX);
    assert_eq!(next_attempt_number(u32::MAX), u32::MAX);
}

#[test]
fn test_stop_after_delay_bounds_elapsed_time() {
    let retryer = Retryer::<Option<bool>>::builder()
        .retry_if_result(Option::is_none)
        .with_stop_strategy(StopAfterDelay::new(Duration::from_millis(50)))
        .unwrap()
        .with_wait_strategy(FixedWait::new(Duration::from_millis(10)))
        .unwrap()
        .build();

    let exhausted = assert_exhausted!(retryer.call(|| Ok::<_, io::Error>(None)));
    let last = exhausted.last_failed_attempt();
    assert!(last.delay_since_first_attempt() >= Duration::from_millis(50));
    assert!(last.attempt_number() > 1);
}

#[test]
fn test_timed_out_attempt_is_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let operation = {
        let calls = Arc::clone(&calls);
        move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                thread::sleep(Duration::from_millis(300));
            }
            Ok::<_, io::Error>("ok")
        }
    };

    let retryer = Retryer::builder()
        .retry_if_exception_of_type::<TimeoutError>()
        .with_attempt_time_limiter(FixedTimeLimit::new(Duration::from_millis(30)))
        .unwrap()
        .build();

    assert_eq!(retryer.call(operation).unwrap(), "ok");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_timeout_without_retry_surfaces_timeout_cause() {
    let retryer = Retryer::<()>::builder()
        .with_attempt_time_limiter(FixedTimeLimit::new(Duration::from_millis(10)))
        .unwrap()
        .build();

    let err = assert_execution_failed!(retryer.call(|| {
        thread::sleep(Duration::from_millis(200));
        Ok::<_, io::Error>(())
    }));
    let timeout = err.cause().downcast_ref::<TimeoutError>().expect("timeout");
    assert_eq!(timeout.duration(), Duration::from_millis(10));
}

#[test]
fn test_exhausted_source_is_last_cause() {
    use std::error::Error as _;

    let retryer = Retryer::<()>::builder()
        .retry_if_exception()
        .with_stop_strategy(StopAfterAttempt::new(2).unwrap())
        .unwrap()
        .build();

    let exhausted = assert_exhausted!(retryer.call(|| Err::<(), _>(TestFailure::new("still down"))), 2);
    assert_eq!(exhausted.source().unwrap().to_string(), "still down");
    assert_eq!(
        exhausted.to_string(),
        "Retrying failed to complete successfully after 2 attempts."
    );
}

#[test]
fn test_wrapped_callable_runs_on_another_thread() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = {
        let seen = Arc::clone(&seen);
        move |attempt: &Attempt<u8>| seen.lock().push(attempt.attempt_number())
    };
    let flaky = FlakyOperation::new()
        .then_err(TestFailure::new("a"))
        .then_ok(1)
        .then_err(TestFailure::new("b"))
        .then_ok(2);

    let callable = Retryer::builder()
        .retry_if_exception()
        .with_retry_listener(recorder)
        .build()
        .wrap(flaky.operation());

    let first = {
        let callable = callable.clone();
        thread::spawn(move || callable.call()).join().unwrap()
    };
    let second = thread::spawn(move || callable.call()).join().unwrap();

    assert_eq!(first.unwrap(), 1);
    assert_eq!(second.unwrap(), 2);
    // Each call starts its own attempt sequence.
    assert_eq!(*seen.lock(), vec![1, 2, 1, 2]);
}

#[test]
fn test_concurrent_calls_share_one_retryer() {
    let retryer = Retryer::<u32>::builder()
        .retry_if_exception()
        .with_stop_strategy(StopAfterAttempt::new(5).unwrap())
        .unwrap()
        .build();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let retryer = retryer.clone();
            thread::spawn(move || {
                let flaky = FlakyOperation::new()
                    .then_err(TestFailure::new("busy"))
                    .then_ok(i);
                retryer.call(flaky.operation())
            })
        })
        .collect();

    let mut results: Vec<u32> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    results.sort();
    assert_eq!(results, vec![0, 1, 2, 3]);
}

#[test]
fn test_retryer_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Retryer<String>>();
    assert_send_sync::<RetryerCallable<String>>();
}

#[cfg(feature = "tracing")]
mod tracing_tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_listener_panic_is_logged() {
        Retryer::builder()
            .with_retry_listener(|_: &Attempt<u8>| panic!("listener bug"))
            .build()
            .call(|| Ok::<_, io::Error>(1))
            .unwrap();

        assert!(logs_contain("retry listener panicked"));
        assert!(logs_contain("listener bug"));
    }

    #[test]
    #[traced_test]
    fn test_rejections_and_exhaustion_are_logged() {
        let retryer = Retryer::<()>::builder()
            .retry_if_exception()
            .with_stop_strategy(StopAfterAttempt::new(2).unwrap())
            .unwrap()
            .build();
        assert_exhausted!(retryer.call(|| Err::<(), _>(TestFailure::new("down"))), 2);

        assert!(logs_contain("attempt rejected, retrying"));
        assert!(logs_contain("retrying stopped"));
    }

    #[test]
    #[traced_test]
    fn test_timeout_is_logged() {
        let retryer = Retryer::<()>::builder()
            .with_attempt_time_limiter(FixedTimeLimit::new(Duration::from_millis(5)))
            .unwrap()
            .build();
        let _ = retryer.call(|| {
            thread::sleep(Duration::from_millis(100));
            Ok::<_, io::Error>(())
        });

        assert!(logs_contain("attempt exceeded its time limit"));
    }
}
