//! Testing utilities for code that retries.
//!
//! This module provides scripted operations, attempt constructors and
//! assertion macros for exercising retry configurations without real
//! flaky dependencies.
//!
//! # Examples
//!
//! ## Scripted operations
//!
//! ```rust
//! use undertow::testing::{FlakyOperation, TestFailure};
//! use undertow::RetryerBuilder;
//!
//! let flaky = FlakyOperation::new()
//!     .then_err(TestFailure::new("connection reset"))
//!     .then_err(TestFailure::new("connection reset"))
//!     .then_ok(42);
//!
//! let retryer = RetryerBuilder::<i32>::new().retry_if_exception().build();
//! assert_eq!(retryer.call(flaky.operation()).unwrap(), 42);
//! assert_eq!(flaky.calls(), 3);
//! ```
//!
//! ## Assertion macros
//!
//! ```rust
//! use undertow::{assert_exhausted, assert_execution_failed, RetryerBuilder, StopAfterAttempt};
//! use undertow::testing::TestFailure;
//!
//! let retryer = RetryerBuilder::<()>::new()
//!     .retry_if_exception()
//!     .with_stop_strategy(StopAfterAttempt::new(2).unwrap())
//!     .unwrap()
//!     .build();
//! let exhausted = assert_exhausted!(retryer.call(|| Err::<(), _>(TestFailure::new("down"))), 2);
//! assert!(exhausted.last_failed_attempt().has_exception());
//!
//! let strict = RetryerBuilder::<()>::new().build();
//! assert_execution_failed!(strict.call(|| Err::<(), _>(TestFailure::new("fatal"))));
//! ```

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::attempt::Attempt;
use crate::error::BoxError;

/// Build an attempt that produced `value`, with no elapsed time.
pub fn result_attempt<T>(value: T, attempt_number: u32) -> Attempt<T> {
    Attempt::from_result(value, attempt_number, Duration::ZERO)
}

/// Build an attempt that failed with `cause`, with no elapsed time.
pub fn failed_attempt<T>(cause: impl Into<BoxError>, attempt_number: u32) -> Attempt<T> {
    Attempt::from_failure(cause, attempt_number, Duration::ZERO)
}

/// A plain error for scripting failures in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    message: &'static str,
}

impl TestFailure {
    /// A failure displaying `message`.
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }

    /// The message this failure displays.
    pub fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl Error for TestFailure {}

/// An operation that replays a scripted sequence of outcomes.
///
/// Each call pops the next outcome. Once the script runs out every call
/// fails with a [`TestFailure`] reading "script exhausted". Clones share
/// the script and the call counter.
pub struct FlakyOperation<T> {
    script: Arc<Mutex<VecDeque<Result<T, BoxError>>>>,
    calls: Arc<AtomicU32>,
}

impl<T: Send + 'static> FlakyOperation<T> {
    /// An operation with an empty script.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Append a successful outcome.
    pub fn then_ok(self, value: T) -> Self {
        self.script.lock().push_back(Ok(value));
        self
    }

    /// Append a failing outcome.
    pub fn then_err(self, cause: impl Into<BoxError>) -> Self {
        self.script.lock().push_back(Err(cause.into()));
        self
    }

    /// Run once, consuming the next scripted outcome.
    pub fn call(&self) -> Result<T, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Box::new(TestFailure::new("script exhausted"))))
    }

    /// A closure sharing this script, ready to hand to a retryer.
    pub fn operation(&self) -> impl Fn() -> Result<T, BoxError> + Send + Sync + 'static {
        let this = self.clone();
        move || this.call()
    }

    /// Number of times the operation has run.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of scripted outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl<T: Send + 'static> Default for FlakyOperation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FlakyOperation<T> {
    fn clone(&self) -> Self {
        Self {
            script: Arc::clone(&self.script),
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<T> fmt::Debug for FlakyOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlakyOperation")
            .field("remaining", &self.script.lock().len())
            .field("calls", &self.calls.load(Ordering::SeqCst))
            .finish()
    }
}

/// Assert that a retry call ended in [`RetryError::Exhausted`](crate::RetryError::Exhausted).
///
/// Evaluates to the [`RetryExhausted`](crate::RetryExhausted) value. With a
/// second argument, also asserts the attempt count.
///
/// # Example
///
/// ```rust
/// use undertow::{assert_exhausted, Attempt, RetryError, RetryExhausted};
/// use std::time::Duration;
///
/// let result: Result<(), _> = Err(RetryError::Exhausted(RetryExhausted::new(
///     Attempt::from_result((), 4, Duration::ZERO),
/// )));
/// assert_exhausted!(result, 4);
/// ```
#[macro_export]
macro_rules! assert_exhausted {
    ($result:expr) => {
        match $result {
            Err($crate::RetryError::Exhausted(exhausted)) => exhausted,
            Err($crate::RetryError::ExecutionFailed(e)) => {
                panic!("Expected Exhausted, got ExecutionFailed: {}", e);
            }
            Ok(v) => {
                panic!("Expected Exhausted, got Ok: {:?}", v);
            }
        }
    };
    ($result:expr, $attempts:expr) => {{
        let exhausted = $crate::assert_exhausted!($result);
        assert_eq!(
            exhausted.attempt_count(),
            $attempts,
            "Expected exhaustion after {} attempts",
            $attempts
        );
        exhausted
    }};
}

/// Assert that a retry call ended in [`RetryError::ExecutionFailed`](crate::RetryError::ExecutionFailed).
///
/// Evaluates to the [`ExecutionError`](crate::ExecutionError).
///
/// # Example
///
/// ```rust
/// use undertow::{assert_execution_failed, ExecutionError, RetryError};
///
/// let result: Result<(), RetryError<()>> =
///     Err(RetryError::ExecutionFailed(ExecutionError::new("fatal")));
/// let err = assert_execution_failed!(result);
/// assert_eq!(err.cause().to_string(), "fatal");
/// ```
#[macro_export]
macro_rules! assert_execution_failed {
    ($result:expr) => {
        match $result {
            Err($crate::RetryError::ExecutionFailed(e)) => e,
            Err($crate::RetryError::Exhausted(exhausted)) => {
                panic!("Expected ExecutionFailed, got Exhausted: {}", exhausted);
            }
            Ok(v) => {
                panic!("Expected ExecutionFailed, got Ok: {:?}", v);
            }
        }
    };
}
