//! # Undertow
//!
//! > *"Keep pulling until it gives"*
//!
//! A Rust library for retrying fallible operations with composable policies.
//!
//! ## Philosophy
//!
//! Every retry decision is a small, pure strategy over an [`Attempt`]:
//! - **Rejection**: should this attempt be retried? ([`RejectionPredicate`])
//! - **Stop**: has retrying gone on long enough? ([`StopStrategy`])
//! - **Wait**: how long until the next attempt? ([`WaitStrategy`])
//!
//! The [`Retryer`] is the imperative shell that runs the operation, blocks
//! between attempts ([`BlockStrategy`]), bounds each attempt
//! ([`AttemptTimeLimiter`]) and notifies observers ([`RetryListener`]).
//!
//! ## Quick Example
//!
//! ```rust
//! use undertow::{ExponentialWait, RetryError, Retryer, StopAfterAttempt};
//! use std::io;
//! use std::time::Duration;
//!
//! let retryer = Retryer::<Option<String>>::builder()
//!     .retry_if_result(Option::is_none)
//!     .retry_if_exception_of_type::<io::Error>()
//!     .with_wait_strategy(ExponentialWait::with_max(Duration::from_millis(50)))
//!     .unwrap()
//!     .with_stop_strategy(StopAfterAttempt::new(5).unwrap())
//!     .unwrap()
//!     .build();
//!
//! match retryer.call(|| Ok::<_, io::Error>(Some("pong".to_string()))) {
//!     Ok(reply) => println!("reply: {:?}", reply),
//!     Err(RetryError::Exhausted(e)) => println!("gave up: {}", e),
//!     Err(RetryError::ExecutionFailed(e)) => println!("fatal: {}", e),
//! }
//! ```
//!
//! For more examples, see the `demos/` directory.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod attempt;
pub mod block;
pub mod cancel;
pub mod config;
pub mod error;
pub mod limiter;
pub mod listener;
pub mod predicate;
pub mod retryer;
pub mod stop;
pub mod testing;
pub mod wait;

// Re-exports
pub use attempt::{Attempt, Outcome};
pub use block::{BlockStrategy, SleepBlockStrategy};
pub use cancel::CancellationToken;
pub use config::{RetryConfig, StopConfig, WaitConfig};
pub use error::{
    find_cause, BoxError, BuildError, Cancelled, ExecutionError, InvalidState, RetryError,
    RetryExhausted, TimeoutError, WorkerPanicked,
};
pub use limiter::{AttemptTimeLimiter, FixedTimeLimit, NoTimeLimit, Operation, WorkerPool};
#[cfg(feature = "tracing")]
pub use listener::TracingListener;
pub use listener::RetryListener;
pub use predicate::RejectionPredicate;
pub use retryer::{Retryer, RetryerBuilder, RetryerCallable};
pub use stop::{NeverStop, StopAfterAttempt, StopAfterDelay, StopStrategy};
pub use wait::{
    ExceptionWait, ExponentialWait, FibonacciWait, FixedWait, IncrementingWait, JoinWait,
    NoWait, RandomWait, WaitStrategy,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::attempt::{Attempt, Outcome};
    pub use crate::block::BlockStrategy;
    pub use crate::cancel::CancellationToken;
    pub use crate::error::{BoxError, RetryError, RetryExhausted};
    pub use crate::listener::RetryListener;
    pub use crate::retryer::{Retryer, RetryerBuilder};
    pub use crate::stop::{StopAfterAttempt, StopAfterDelay, StopStrategy};
    pub use crate::wait::{ExponentialWait, FibonacciWait, FixedWait, WaitStrategy};
}
