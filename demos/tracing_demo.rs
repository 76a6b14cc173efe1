//! Demonstrates tracing integration with the retry loop
//!
//! Run with: cargo run --example tracing_demo --features tracing

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use undertow::{FixedTimeLimit, FixedWait, Retryer, StopAfterAttempt, TracingListener};

fn main() {
    // Set up tracing subscriber
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    tracing::info!("Starting tracing demo");

    let retryer = Retryer::<String>::builder()
        .retry_if_exception_of_type::<io::Error>()
        .with_attempt_time_limiter(FixedTimeLimit::new(Duration::from_millis(100)))
        .unwrap()
        .with_wait_strategy(FixedWait::new(Duration::from_millis(20)))
        .unwrap()
        .with_stop_strategy(StopAfterAttempt::new(4).unwrap())
        .unwrap()
        .with_retry_listener(TracingListener::new("fetch-profile"))
        .build();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let result = retryer.call(move || match counter.fetch_add(1, Ordering::SeqCst) {
        0 | 1 => Err(io::Error::other("connection reset")),
        _ => Ok("profile#42".to_string()),
    });

    match result {
        Ok(profile) => tracing::info!("Workflow completed successfully: {}", profile),
        Err(e) => tracing::error!("Workflow failed: {}", e),
    }

    let failing = retryer.call(|| Err::<String, _>(io::Error::other("still down")));
    if let Err(e) = failing {
        tracing::error!("Gave up: {}", e);
    }
}
