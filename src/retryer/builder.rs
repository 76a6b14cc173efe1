//! Fluent assembly of a [`Retryer`].

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use super::Retryer;
use crate::attempt::Attempt;
use crate::block::{BlockStrategy, SleepBlockStrategy};
use crate::error::BuildError;
use crate::limiter::{AttemptTimeLimiter, NoTimeLimit};
use crate::listener::RetryListener;
use crate::predicate::RejectionPredicate;
use crate::stop::{NeverStop, StopStrategy};
use crate::wait::{NoWait, WaitStrategy};

/// Builder for [`Retryer`].
///
/// The limiter, stop, wait and block strategies are single slots: setting
/// one twice fails with [`BuildError::Conflict`]. Listeners and retry
/// conditions accumulate. Unset slots default to [`NoTimeLimit`],
/// [`NeverStop`], [`NoWait`] and [`SleepBlockStrategy`]; with no retry
/// conditions the first attempt is always final.
///
/// # Examples
///
/// ```rust
/// use undertow::{FixedWait, RetryerBuilder, StopAfterAttempt};
/// use std::io;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), undertow::BuildError> {
/// let retryer = RetryerBuilder::<String>::new()
///     .retry_if_exception_of_type::<io::Error>()
///     .retry_if_result(|body| body.is_empty())
///     .with_stop_strategy(StopAfterAttempt::new(5)?)?
///     .with_wait_strategy(FixedWait::new(Duration::from_millis(1)))?
///     .build();
///
/// let body = retryer.call(|| Ok::<_, io::Error>("hello".to_string())).unwrap();
/// assert_eq!(body, "hello");
/// # Ok(())
/// # }
/// ```
pub struct RetryerBuilder<T> {
    limiter: Option<Arc<dyn AttemptTimeLimiter<T>>>,
    stop: Option<Arc<dyn StopStrategy<T>>>,
    wait: Option<Arc<dyn WaitStrategy<T>>>,
    block: Option<Arc<dyn BlockStrategy>>,
    predicate: RejectionPredicate<T>,
    listeners: Vec<Arc<dyn RetryListener<T>>>,
}

impl<T: Send + 'static> RetryerBuilder<T> {
    /// An empty builder.
    pub fn new() -> Self {
        Self {
            limiter: None,
            stop: None,
            wait: None,
            block: None,
            predicate: RejectionPredicate::new(),
            listeners: Vec::new(),
        }
    }

    /// Bound each attempt with `limiter`.
    pub fn with_attempt_time_limiter<L>(mut self, limiter: L) -> Result<Self, BuildError>
    where
        L: AttemptTimeLimiter<T> + 'static,
    {
        if self.limiter.is_some() {
            return Err(BuildError::Conflict {
                slot: "time limiter",
            });
        }
        self.limiter = Some(Arc::new(limiter));
        Ok(self)
    }

    /// Decide when to give up with `stop`.
    pub fn with_stop_strategy<S>(mut self, stop: S) -> Result<Self, BuildError>
    where
        S: StopStrategy<T> + 'static,
    {
        if self.stop.is_some() {
            return Err(BuildError::Conflict {
                slot: "stop strategy",
            });
        }
        self.stop = Some(Arc::new(stop));
        Ok(self)
    }

    /// Compute delays between attempts with `wait`.
    pub fn with_wait_strategy<W>(mut self, wait: W) -> Result<Self, BuildError>
    where
        W: WaitStrategy<T> + 'static,
    {
        if self.wait.is_some() {
            return Err(BuildError::Conflict {
                slot: "wait strategy",
            });
        }
        self.wait = Some(Arc::new(wait));
        Ok(self)
    }

    /// Perform delays with `block`.
    pub fn with_block_strategy<B>(mut self, block: B) -> Result<Self, BuildError>
    where
        B: BlockStrategy + 'static,
    {
        if self.block.is_some() {
            return Err(BuildError::Conflict {
                slot: "block strategy",
            });
        }
        self.block = Some(Arc::new(block));
        Ok(self)
    }

    /// Notify `listener` of every attempt, after previously added listeners.
    pub fn with_retry_listener<L>(mut self, listener: L) -> Self
    where
        L: RetryListener<T> + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Retry on every failure.
    pub fn retry_if_exception(mut self) -> Self {
        self.predicate = self.predicate.or_any_error();
        self
    }

    /// Retry on failures whose cause, or any error in its source chain, is an `X`.
    pub fn retry_if_exception_of_type<X>(mut self) -> Self
    where
        X: Error + 'static,
    {
        self.predicate = self.predicate.or_error_type::<X>();
        self
    }

    /// Retry on failures whose cause satisfies `predicate`.
    pub fn retry_if_exception_matching<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&(dyn Error + Send + Sync + 'static)) -> bool + Send + Sync + 'static,
    {
        self.predicate = self.predicate.or_error(predicate);
        self
    }

    /// Retry when a produced value satisfies `predicate`.
    pub fn retry_if_result<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicate = self.predicate.or_result(predicate);
        self
    }

    /// Retry when the whole attempt satisfies `predicate`.
    pub fn retry_if_attempt<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Attempt<T>) -> bool + Send + Sync + 'static,
    {
        self.predicate = self.predicate.or_attempt(predicate);
        self
    }

    /// Build the retryer, filling unset slots with defaults.
    pub fn build(self) -> Retryer<T> {
        Retryer {
            limiter: self.limiter.unwrap_or_else(|| Arc::new(NoTimeLimit)),
            stop: self.stop.unwrap_or_else(|| Arc::new(NeverStop)),
            wait: self.wait.unwrap_or_else(|| Arc::new(NoWait)),
            block: self.block.unwrap_or_else(|| Arc::new(SleepBlockStrategy)),
            predicate: self.predicate,
            listeners: self.listeners.into(),
        }
    }
}

impl<T: Send + 'static> Default for RetryerBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for RetryerBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryerBuilder")
            .field("limiter_set", &self.limiter.is_some())
            .field("stop_set", &self.stop.is_some())
            .field("wait_set", &self.wait.is_some())
            .field("block_set", &self.block.is_some())
            .field("predicate", &self.predicate)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stop::StopAfterAttempt;
    use crate::wait::FixedWait;
    use std::time::Duration;

    #[test]
    fn test_second_stop_strategy_conflicts() {
        let err = RetryerBuilder::<()>::new()
            .with_stop_strategy(NeverStop)
            .unwrap()
            .with_stop_strategy(StopAfterAttempt::new(3).unwrap())
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::Conflict {
                slot: "stop strategy"
            }
        );
        assert_eq!(err.to_string(), "a stop strategy has already been set");
    }

    #[test]
    fn test_each_singular_slot_conflicts() {
        let builder = || {
            RetryerBuilder::<()>::new()
                .with_attempt_time_limiter(NoTimeLimit)
                .unwrap()
                .with_wait_strategy(NoWait)
                .unwrap()
                .with_block_strategy(SleepBlockStrategy)
                .unwrap()
        };
        assert!(builder().with_attempt_time_limiter(NoTimeLimit).is_err());
        assert!(builder()
            .with_wait_strategy(FixedWait::new(Duration::from_millis(1)))
            .is_err());
        assert!(builder().with_block_strategy(SleepBlockStrategy).is_err());
    }

    #[test]
    fn test_multi_slots_accumulate() {
        let builder = RetryerBuilder::<u8>::new()
            .retry_if_exception()
            .retry_if_result(|v| *v == 0)
            .retry_if_attempt(|a| a.attempt_number() < 2)
            .with_retry_listener(|_: &Attempt<u8>| {})
            .with_retry_listener(|_: &Attempt<u8>| {});
        assert_eq!(builder.predicate.len(), 3);
        assert_eq!(builder.listeners.len(), 2);
    }

    #[test]
    fn test_debug_reports_slots() {
        let builder = RetryerBuilder::<u8>::new().with_stop_strategy(NeverStop).unwrap();
        let debug = format!("{:?}", builder);
        assert!(debug.contains("stop_set: true"));
        assert!(debug.contains("wait_set: false"));
    }
}
