//! Error types for retry operations.
//!
//! A finished [`Retryer::call`](crate::Retryer::call) fails in one of two
//! distinguishable ways, both carried by [`RetryError`]:
//!
//! - [`ExecutionError`]: the last attempt was *accepted* but was itself a
//!   failure. The wrapper holds the operation's original cause.
//! - [`RetryExhausted`]: the stop strategy (or a cancellation) ended the loop
//!   while the most recent attempt was still rejected.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use crate::attempt::Attempt;

/// The failure cause type carried by a failed [`Attempt`].
///
/// Operations may fail with any error convertible into this box.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Terminal error of a retry loop.
///
/// # Examples
///
/// ```rust
/// use undertow::{RetryError, Retryer, StopAfterAttempt};
///
/// let retryer = Retryer::<u32>::builder()
///     .retry_if_exception()
///     .with_stop_strategy(StopAfterAttempt::new(2).unwrap())
///     .unwrap()
///     .build();
///
/// match retryer.call(|| Err::<u32, _>(std::io::Error::other("down"))) {
///     Err(RetryError::Exhausted(exhausted)) => assert_eq!(exhausted.attempt_count(), 2),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug)]
pub enum RetryError<T> {
    /// The accepted attempt was a failure; the operation's cause is inside.
    ExecutionFailed(ExecutionError),
    /// Retrying ended while the last attempt was still rejected.
    Exhausted(RetryExhausted<T>),
}

impl<T> RetryError<T> {
    /// Returns true if retrying was exhausted (stopped or cancelled).
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// Returns true if an accepted attempt failed.
    pub fn is_execution_failed(&self) -> bool {
        matches!(self, Self::ExecutionFailed(_))
    }

    /// Get the exhaustion details if present.
    pub fn into_exhausted(self) -> Option<RetryExhausted<T>> {
        match self {
            Self::Exhausted(e) => Some(e),
            Self::ExecutionFailed(_) => None,
        }
    }

    /// Get the execution error if present.
    pub fn into_execution_error(self) -> Option<ExecutionError> {
        match self {
            Self::ExecutionFailed(e) => Some(e),
            Self::Exhausted(_) => None,
        }
    }
}

impl<T> fmt::Display for RetryError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed(e) => write!(f, "{}", e),
            Self::Exhausted(e) => write!(f, "{}", e),
        }
    }
}

impl<T: fmt::Debug> Error for RetryError<T> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ExecutionFailed(e) => e.source(),
            Self::Exhausted(e) => e.source(),
        }
    }
}

/// Error returned when an accepted attempt was a failure.
///
/// The wrapper is never the real cause: use [`cause`](Self::cause) or
/// [`Error::source`] to reach the operation's own error.
#[derive(Debug)]
pub struct ExecutionError {
    cause: BoxError,
}

impl ExecutionError {
    /// Wrap a failure cause.
    pub fn new(cause: impl Into<BoxError>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// Get a reference to the original cause.
    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// Extract the original cause.
    pub fn into_cause(self) -> BoxError {
        self.cause
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "execution failed: {}", self.cause)
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Error returned when all retry attempts are exhausted.
///
/// Owns the last rejected attempt so callers can tell whether the final
/// rejection was a bad result or an error, and what that error was.
#[derive(Debug)]
pub struct RetryExhausted<T> {
    last_failed_attempt: Attempt<T>,
    cancelled: bool,
}

impl<T> RetryExhausted<T> {
    /// Retrying stopped after `attempt`.
    pub fn new(last_failed_attempt: Attempt<T>) -> Self {
        Self {
            last_failed_attempt,
            cancelled: false,
        }
    }

    /// Retrying was cancelled while waiting after `attempt`.
    pub fn cancelled(last_failed_attempt: Attempt<T>) -> Self {
        Self {
            last_failed_attempt,
            cancelled: true,
        }
    }

    /// Total number of attempts made.
    pub fn attempt_count(&self) -> u32 {
        self.last_failed_attempt.attempt_number()
    }

    /// The attempt that was rejected when retrying ended.
    pub fn last_failed_attempt(&self) -> &Attempt<T> {
        &self.last_failed_attempt
    }

    /// Extract the last rejected attempt.
    pub fn into_last_failed_attempt(self) -> Attempt<T> {
        self.last_failed_attempt
    }

    /// Returns true if a cancellation, not the stop strategy, ended retrying.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Total time spent from the first attempt to the last one.
    pub fn total_duration(&self) -> Duration {
        self.last_failed_attempt.delay_since_first_attempt()
    }
}

impl<T> fmt::Display for RetryExhausted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Retrying failed to complete successfully after {} attempts.",
            self.attempt_count()
        )?;
        if self.cancelled {
            write!(f, " (cancelled while waiting)")?;
        }
        Ok(())
    }
}

impl<T: fmt::Debug> Error for RetryExhausted<T> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self.last_failed_attempt.exception_cause() {
            Ok(cause) => Some(cause),
            Err(_) => None,
        }
    }
}

/// Error returned when a single attempt exceeds its time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError {
    duration: Duration,
}

impl TimeoutError {
    /// Create a timeout error for the given limit.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// The time limit that was exceeded.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt timed out after {:?}", self.duration)
    }
}

impl Error for TimeoutError {}

/// The operation panicked while running on a pool worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerPanicked;

impl fmt::Display for WorkerPanicked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation panicked on a worker thread")
    }
}

impl Error for WorkerPanicked {}

/// Returned by accessors called on the wrong [`Attempt`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidState {
    message: &'static str,
}

impl InvalidState {
    pub(crate) fn new(message: &'static str) -> Self {
        Self { message }
    }
}

impl fmt::Display for InvalidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for InvalidState {}

/// A blocking wait was interrupted by its [`CancellationToken`](crate::CancellationToken).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wait was cancelled")
    }
}

impl Error for Cancelled {}

/// Invalid retryer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A singular slot (stop, wait, block, time limiter) was assigned twice.
    Conflict {
        /// Which slot was already set.
        slot: &'static str,
    },
    /// A strategy parameter is out of range.
    InvalidArgument(String),
    /// A joined wait strategy had an absent component.
    NullWaitStrategy,
}

impl BuildError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict { slot } => write!(f, "a {} has already been set", slot),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::NullWaitStrategy => write!(f, "Cannot have a null wait strategy"),
        }
    }
}

impl Error for BuildError {}

/// Find an error of type `X` in `cause` or anywhere in its source chain.
///
/// This is how type-based retry conditions and [`ExceptionWait`](crate::ExceptionWait)
/// decide whether a failure "is" an `X`.
///
/// ```rust
/// use undertow::find_cause;
/// use std::io;
///
/// let cause: undertow::BoxError = Box::new(io::Error::other("boom"));
/// assert!(find_cause::<io::Error>(cause.as_ref()).is_some());
/// assert!(find_cause::<std::fmt::Error>(cause.as_ref()).is_none());
/// ```
pub fn find_cause<'a, X>(cause: &'a (dyn Error + Send + Sync + 'static)) -> Option<&'a X>
where
    X: Error + 'static,
{
    let mut current: Option<&'a (dyn Error + 'static)> = Some(cause);
    while let Some(err) = current {
        if let Some(found) = err.downcast_ref::<X>() {
            return Some(found);
        }
        current = err.source();
    }
    None
}

#[cfg(test)]
mod error_tests {
    use super::*;
    use std::io;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "wrapper")
        }
    }

    impl Error for Wrapper {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_retry_exhausted_display() {
        let err = RetryExhausted::new(Attempt::from_result(
            "bad",
            3,
            Duration::from_millis(500),
        ));
        let display = format!("{}", err);
        assert!(display.contains("Retrying failed"));
        assert!(display.contains("3 attempts"));
        assert!(!display.contains("cancelled"));
    }

    #[test]
    fn test_retry_exhausted_cancelled_display() {
        let err = RetryExhausted::cancelled(Attempt::from_result((), 2, Duration::ZERO));
        assert!(err.was_cancelled());
        assert!(format!("{}", err).contains("cancelled"));
    }

    #[test]
    fn test_retry_exhausted_source_is_last_cause() {
        let err = RetryExhausted::<()>::new(Attempt::from_failure(
            io::Error::other("disk on fire"),
            4,
            Duration::from_secs(1),
        ));
        let source = err.source().expect("failure attempt exposes its cause");
        assert_eq!(source.to_string(), "disk on fire");
        assert_eq!(err.attempt_count(), 4);
        assert_eq!(err.total_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_exhausted_result_has_no_source() {
        let err = RetryExhausted::new(Attempt::from_result(None::<u8>, 3, Duration::ZERO));
        assert!(err.source().is_none());
    }

    #[test]
    fn test_execution_error_exposes_cause() {
        let err = ExecutionError::new(io::Error::other("refused"));
        assert_eq!(err.cause().to_string(), "refused");
        assert_eq!(err.source().map(|s| s.to_string()), Some("refused".into()));
        assert!(format!("{}", err).starts_with("execution failed"));
        let cause = err.into_cause();
        assert!(cause.downcast_ref::<io::Error>().is_some());
    }

    #[test]
    fn test_retry_error_predicates() {
        let failed: RetryError<()> = RetryError::ExecutionFailed(ExecutionError::new("x"));
        assert!(failed.is_execution_failed());
        assert!(!failed.is_exhausted());
        assert!(failed.into_execution_error().is_some());

        let exhausted: RetryError<()> =
            RetryError::Exhausted(RetryExhausted::new(Attempt::from_result((), 1, Duration::ZERO)));
        assert!(exhausted.is_exhausted());
        assert!(exhausted.into_exhausted().is_some());
    }

    #[test]
    fn test_timeout_error_display() {
        let err = TimeoutError::new(Duration::from_secs(5));
        assert_eq!(err.duration(), Duration::from_secs(5));
        assert!(format!("{}", err).contains("timed out"));
    }

    #[test]
    fn test_build_error_display() {
        let conflict = BuildError::Conflict {
            slot: "stop strategy",
        };
        assert_eq!(conflict.to_string(), "a stop strategy has already been set");
        assert!(BuildError::NullWaitStrategy
            .to_string()
            .contains("Cannot have a null wait strategy"));
    }

    #[test]
    fn test_find_cause_walks_source_chain() {
        let cause: BoxError = Box::new(Wrapper(io::Error::other("inner")));
        assert!(find_cause::<Wrapper>(cause.as_ref()).is_some());
        let inner = find_cause::<io::Error>(cause.as_ref()).expect("io error in chain");
        assert_eq!(inner.to_string(), "inner");
        assert!(find_cause::<TimeoutError>(cause.as_ref()).is_none());
    }
}
