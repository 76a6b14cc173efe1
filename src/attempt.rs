//! The outcome of a single execution of a retried operation.

use std::error::Error;
use std::time::Duration;

use crate::error::{BoxError, ExecutionError, InvalidState};

/// What one execution produced: a value or a failure cause, never both.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation returned a value.
    Result(T),
    /// The operation failed with a cause.
    Failure(BoxError),
}

/// Immutable record of one execution of an operation.
///
/// Attempts are numbered from 1 within a single [`Retryer::call`](crate::Retryer::call)
/// and carry the time elapsed since the first attempt of that call began.
///
/// # Examples
///
/// ```rust
/// use undertow::Attempt;
/// use std::time::Duration;
///
/// let attempt = Attempt::from_result(42, 1, Duration::ZERO);
/// assert!(attempt.has_result());
/// assert_eq!(attempt.result().unwrap(), &42);
/// assert!(attempt.exception_cause().is_err());
/// ```
#[derive(Debug)]
pub struct Attempt<T> {
    outcome: Outcome<T>,
    attempt_number: u32,
    delay_since_first_attempt: Duration,
}

impl<T> Attempt<T> {
    pub(crate) fn new(
        outcome: Result<T, BoxError>,
        attempt_number: u32,
        delay_since_first_attempt: Duration,
    ) -> Self {
        let outcome = match outcome {
            Ok(value) => Outcome::Result(value),
            Err(cause) => Outcome::Failure(cause),
        };
        Self {
            outcome,
            attempt_number,
            delay_since_first_attempt,
        }
    }

    /// An attempt that produced `value`.
    pub fn from_result(value: T, attempt_number: u32, delay_since_first_attempt: Duration) -> Self {
        Self::new(Ok(value), attempt_number, delay_since_first_attempt)
    }

    /// An attempt that failed with `cause`.
    pub fn from_failure(
        cause: impl Into<BoxError>,
        attempt_number: u32,
        delay_since_first_attempt: Duration,
    ) -> Self {
        Self::new(Err(cause.into()), attempt_number, delay_since_first_attempt)
    }

    /// Returns true if the operation produced a value.
    pub fn has_result(&self) -> bool {
        matches!(self.outcome, Outcome::Result(_))
    }

    /// Returns true if the operation failed.
    pub fn has_exception(&self) -> bool {
        matches!(self.outcome, Outcome::Failure(_))
    }

    /// Borrow the tagged outcome.
    pub fn outcome(&self) -> &Outcome<T> {
        &self.outcome
    }

    /// The value, or the failure wrapped in an [`ExecutionError`].
    pub fn get(self) -> Result<T, ExecutionError> {
        self.into_result().map_err(ExecutionError::new)
    }

    /// The value, or the raw failure cause.
    pub fn into_result(self) -> Result<T, BoxError> {
        match self.outcome {
            Outcome::Result(value) => Ok(value),
            Outcome::Failure(cause) => Err(cause),
        }
    }

    /// The value produced by this attempt.
    ///
    /// Fails with [`InvalidState`] if the attempt was a failure.
    pub fn result(&self) -> Result<&T, InvalidState> {
        match &self.outcome {
            Outcome::Result(value) => Ok(value),
            Outcome::Failure(_) => Err(InvalidState::new(
                "The attempt resulted in an exception, not in a result",
            )),
        }
    }

    /// The cause this attempt failed with.
    ///
    /// Fails with [`InvalidState`] if the attempt produced a value.
    pub fn exception_cause(&self) -> Result<&(dyn Error + Send + Sync + 'static), InvalidState> {
        match &self.outcome {
            Outcome::Failure(cause) => Ok(&**cause),
            Outcome::Result(_) => Err(InvalidState::new(
                "The attempt resulted in a result, not in an exception",
            )),
        }
    }

    /// 1-based position of this attempt within its call.
    ///
    /// Strictly increasing across the attempts of one call up to `u32::MAX`.
    /// A call that keeps retrying past that point reports `u32::MAX` for
    /// every later attempt.
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    /// Time elapsed between the start of the first attempt and the end of this one.
    pub fn delay_since_first_attempt(&self) -> Duration {
        self.delay_since_first_attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_result_attempt_accessors() {
        let attempt = Attempt::from_result("ok", 3, Duration::from_millis(20));
        assert!(attempt.has_result());
        assert!(!attempt.has_exception());
        assert_eq!(attempt.attempt_number(), 3);
        assert_eq!(attempt.delay_since_first_attempt(), Duration::from_millis(20));
        assert_eq!(attempt.result(), Ok(&"ok"));
        assert!(attempt.exception_cause().is_err());
        assert_eq!(attempt.get().unwrap(), "ok");
    }

    #[test]
    fn test_failure_attempt_accessors() {
        let attempt = Attempt::<u8>::from_failure(io::Error::other("nope"), 1, Duration::ZERO);
        assert!(attempt.has_exception());
        assert!(!attempt.has_result());
        assert_eq!(attempt.exception_cause().unwrap().to_string(), "nope");
        assert_eq!(
            attempt.result().unwrap_err().to_string(),
            "The attempt resulted in an exception, not in a result"
        );
    }

    #[test]
    fn test_get_wraps_failure() {
        let attempt = Attempt::<u8>::from_failure(io::Error::other("nope"), 1, Duration::ZERO);
        let err = attempt.get().unwrap_err();
        assert!(err.cause().downcast_ref::<io::Error>().is_some());
    }

    #[test]
    fn test_outcome_is_exhaustive() {
        let attempt = Attempt::from_result(7, 1, Duration::ZERO);
        let doubled = match attempt.outcome() {
            Outcome::Result(v) => v * 2,
            Outcome::Failure(_) => 0,
        };
        assert_eq!(doubled, 14);
    }
}
