//! Retry Patterns Example
//!
//! Demonstrates the building blocks of a retryer:
//! - Basic retry with exponential backoff
//! - Conditional retry on error types and results
//! - Retry with observability listeners
//! - Per-attempt timeouts
//! - Cancelling a retry loop from another thread
//! - Loading a retryer from declarative configuration
//!
//! Run with: cargo run --example retry_patterns

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use undertow::{
    Attempt, CancellationToken, ExponentialWait, FibonacciWait, FixedTimeLimit, FixedWait,
    JoinWait, RetryConfig, RetryError, Retryer, StopAfterAttempt, StopConfig, TimeoutError,
    WaitConfig, WaitStrategy,
};

// ==================== Basic Retry ====================

/// Example 1: Basic retry with exponential backoff
fn example_basic_retry() {
    println!("\n=== Example 1: Basic Retry ===");

    let attempts = Arc::new(AtomicU32::new(0));
    let retryer = Retryer::<&str>::builder()
        .retry_if_exception()
        .with_wait_strategy(ExponentialWait::new(Duration::from_millis(50), Duration::from_secs(1)).unwrap())
        .unwrap()
        .with_stop_strategy(StopAfterAttempt::new(5).unwrap())
        .unwrap()
        .build();

    let counter = Arc::clone(&attempts);
    let result = retryer.call(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        println!("  Attempt {}", n + 1);
        if n < 2 {
            Err(io::Error::other("transient failure"))
        } else {
            Ok("success!")
        }
    });

    match result {
        Ok(value) => println!(
            "Success after {} attempts: {}",
            attempts.load(Ordering::SeqCst),
            value
        ),
        Err(e) => println!("Failed: {}", e),
    }
}

// ==================== Conditional Retry ====================

/// Example 2: Retry on some failures and results, fail fast on others
fn example_conditional_retry() {
    println!("\n=== Example 2: Conditional Retry ===");

    let retryer = Retryer::<Option<u32>>::builder()
        .retry_if_result(Option::is_none)
        .retry_if_exception_matching(|cause| {
            cause
                .downcast_ref::<io::Error>()
                .is_some_and(|e| e.kind() == io::ErrorKind::TimedOut)
        })
        .with_wait_strategy(FixedWait::new(Duration::from_millis(10)))
        .unwrap()
        .build();

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let result = retryer.call(move || match counter.fetch_add(1, Ordering::SeqCst) {
        0 => Ok(None),
        1 => Err(io::Error::new(io::ErrorKind::TimedOut, "slow upstream")),
        _ => Err(io::Error::new(io::ErrorKind::PermissionDenied, "forbidden")),
    });

    match result {
        Err(RetryError::ExecutionFailed(e)) => {
            println!("  Not retried after {} attempts: {}", attempts.load(Ordering::SeqCst), e)
        }
        other => println!("  Unexpected: {:?}", other),
    }
}

// ==================== Listeners ====================

/// Example 3: Observe every attempt, with a composed backoff
fn example_listeners() {
    println!("\n=== Example 3: Retry Listeners ===");

    let backoff = JoinWait::new(vec![
        Box::new(FixedWait::new(Duration::from_millis(5))) as Box<dyn WaitStrategy<u32>>,
        Box::new(FibonacciWait::new(Duration::from_millis(5), Duration::from_millis(100)).unwrap()),
    ])
    .unwrap();

    let retryer = Retryer::<u32>::builder()
        .retry_if_result(|v| *v < 3)
        .with_wait_strategy(backoff)
        .unwrap()
        .with_retry_listener(|attempt: &Attempt<u32>| {
            println!(
                "  attempt #{} after {:?}: {:?}",
                attempt.attempt_number(),
                attempt.delay_since_first_attempt(),
                attempt.result()
            );
        })
        .build();

    let counter = Arc::new(AtomicU32::new(0));
    let value = retryer
        .call(move || Ok::<_, io::Error>(counter.fetch_add(1, Ordering::SeqCst)))
        .unwrap();
    println!("  Accepted value {}", value);
}

// ==================== Timeouts ====================

/// Example 4: Bound each attempt and retry the ones that time out
fn example_timeout() {
    println!("\n=== Example 4: Per-attempt Timeout ===");

    let retryer = Retryer::<&str>::builder()
        .retry_if_exception_of_type::<TimeoutError>()
        .with_attempt_time_limiter(FixedTimeLimit::new(Duration::from_millis(50)))
        .unwrap()
        .with_stop_strategy(StopAfterAttempt::new(3).unwrap())
        .unwrap()
        .build();

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let result = retryer.call(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(200));
        }
        Ok::<_, io::Error>("fast response")
    });

    println!(
        "  {:?} after {} attempts",
        result.map_err(|e| e.to_string()),
        attempts.load(Ordering::SeqCst)
    );
}

// ==================== Cancellation ====================

/// Example 5: Cancel a long wait from another thread
fn example_cancellation() {
    println!("\n=== Example 5: Cancellation ===");

    let retryer = Retryer::<()>::builder()
        .retry_if_exception()
        .with_wait_strategy(FixedWait::new(Duration::from_secs(30)))
        .unwrap()
        .build();

    let token = CancellationToken::new();
    let remote = token.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        println!("  Cancelling...");
        remote.cancel();
    });

    match retryer.call_with_cancel(|| Err::<(), _>(io::Error::other("service down")), &token) {
        Err(RetryError::Exhausted(e)) => println!("  {} (cancelled: {})", e, e.was_cancelled()),
        other => println!("  Unexpected: {:?}", other),
    }
}

// ==================== Configuration ====================

/// Example 6: Build a retryer from plain data
fn example_config() {
    println!("\n=== Example 6: Declarative Configuration ===");

    let config = RetryConfig {
        stop: StopConfig::AfterAttempt { attempts: 3 },
        wait: WaitConfig::Incrementing {
            initial: Duration::from_millis(10),
            increment: Duration::from_millis(10),
        },
        attempt_timeout: None,
        retry_on_error: true,
    };

    let retryer = match config.build::<u32>() {
        Ok(retryer) => retryer,
        Err(e) => {
            println!("  Invalid configuration: {}", e);
            return;
        }
    };

    let result = retryer.call(|| Err::<u32, _>(io::Error::other("always failing")));
    if let Err(RetryError::Exhausted(e)) = result {
        println!("  {}", e);
    }
}

fn main() {
    println!("Retry Patterns Examples");
    println!("=======================");

    example_basic_retry();
    example_conditional_retry();
    example_listeners();
    example_timeout();
    example_cancellation();
    example_config();

    println!("\n=== All examples completed ===");
}
