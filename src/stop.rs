//! Deciding when to give up retrying.

use std::time::Duration;

use crate::attempt::Attempt;
use crate::error::BuildError;

/// Decides, from a rejected attempt, whether retrying should end.
///
/// Implementations are stateless: the decision depends only on the
/// attempt's number and elapsed time.
pub trait StopStrategy<T>: Send + Sync {
    /// Returns true if retrying should stop after `attempt`.
    fn should_stop(&self, attempt: &Attempt<T>) -> bool;
}

impl<T, F> StopStrategy<T> for F
where
    F: Fn(&Attempt<T>) -> bool + Send + Sync,
{
    fn should_stop(&self, attempt: &Attempt<T>) -> bool {
        self(attempt)
    }
}

/// Never stops; retrying continues until an attempt is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeverStop;

impl<T> StopStrategy<T> for NeverStop {
    fn should_stop(&self, _attempt: &Attempt<T>) -> bool {
        false
    }
}

/// Stops once `max_attempts` attempts have been made.
///
/// # Examples
///
/// ```rust
/// use undertow::{Attempt, StopAfterAttempt, StopStrategy};
/// use std::time::Duration;
///
/// let stop = StopAfterAttempt::new(3).unwrap();
/// assert!(!stop.should_stop(&Attempt::from_result((), 2, Duration::ZERO)));
/// assert!(stop.should_stop(&Attempt::from_result((), 3, Duration::ZERO)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopAfterAttempt {
    max_attempts: u32,
}

impl StopAfterAttempt {
    /// Stop after `max_attempts` attempts. Fails if `max_attempts` is zero.
    pub fn new(max_attempts: u32) -> Result<Self, BuildError> {
        if max_attempts == 0 {
            return Err(BuildError::invalid("max_attempts must be >= 1"));
        }
        Ok(Self { max_attempts })
    }

    /// The attempt number at which retrying stops.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl<T> StopStrategy<T> for StopAfterAttempt {
    fn should_stop(&self, attempt: &Attempt<T>) -> bool {
        attempt.attempt_number() >= self.max_attempts
    }
}

/// Stops once `max_delay` has elapsed since the first attempt began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopAfterDelay {
    max_delay: Duration,
}

impl StopAfterDelay {
    /// Stop once an attempt finishes `max_delay` or later after the first began.
    pub fn new(max_delay: Duration) -> Self {
        Self { max_delay }
    }

    /// The elapsed-time budget.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl<T> StopStrategy<T> for StopAfterDelay {
    fn should_stop(&self, attempt: &Attempt<T>) -> bool {
        attempt.delay_since_first_attempt() >= self.max_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(number: u32, elapsed_ms: u64) -> Attempt<()> {
        Attempt::from_result((), number, Duration::from_millis(elapsed_ms))
    }

    #[test]
    fn test_never_stop() {
        assert!(!NeverStop.should_stop(&at(1, 0)));
        assert!(!NeverStop.should_stop(&at(u32::MAX, u64::MAX / 2)));
    }

    #[test]
    fn test_stop_after_attempt() {
        let stop = StopAfterAttempt::new(3).unwrap();
        assert!(!stop.should_stop(&at(1, 0)));
        assert!(!stop.should_stop(&at(2, 0)));
        assert!(stop.should_stop(&at(3, 0)));
        assert!(stop.should_stop(&at(4, 0)));
    }

    #[test]
    fn test_stop_after_one_attempt_stops_immediately() {
        let stop = StopAfterAttempt::new(1).unwrap();
        assert!(stop.should_stop(&at(1, 0)));
    }

    #[test]
    fn test_stop_after_zero_attempts_rejected() {
        assert!(matches!(
            StopAfterAttempt::new(0),
            Err(BuildError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_stop_after_delay() {
        let stop = StopAfterDelay::new(Duration::from_millis(1000));
        assert!(!stop.should_stop(&at(2, 999)));
        assert!(stop.should_stop(&at(2, 1000)));
        assert!(stop.should_stop(&at(2, 1001)));
    }

    #[test]
    fn test_closure_stop_strategy() {
        let stop = |attempt: &Attempt<()>| attempt.attempt_number() > 1;
        assert!(!StopStrategy::should_stop(&stop, &at(1, 0)));
        assert!(StopStrategy::should_stop(&stop, &at(2, 0)));
    }
}
