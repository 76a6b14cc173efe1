//! The retry loop.
//!
//! A [`Retryer`] runs an operation until an attempt is accepted or the stop
//! strategy gives up:
//!
//! 1. run the operation through the time limiter and record an [`Attempt`]
//! 2. notify listeners in registration order
//! 3. accepted: return the value, or [`RetryError::ExecutionFailed`] for a failure
//! 4. rejected: stop with [`RetryError::Exhausted`], or wait, block and loop
//!
//! Cancelling the [`CancellationToken`] while blocked ends the call with an
//! exhausted error flagged as cancelled; the token stays cancelled.
//!
//! # Examples
//!
//! ```rust
//! use undertow::{Retryer, StopAfterAttempt};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! let retryer = Retryer::<u32>::builder()
//!     .retry_if_exception()
//!     .with_stop_strategy(StopAfterAttempt::new(3).unwrap())
//!     .unwrap()
//!     .build();
//!
//! let calls = Arc::new(AtomicU32::new(0));
//! let counter = Arc::clone(&calls);
//! let result = retryer.call(move || {
//!     if counter.fetch_add(1, Ordering::SeqCst) < 1 {
//!         Err("connection reset")
//!     } else {
//!         Ok(7)
//!     }
//! });
//!
//! assert_eq!(result.unwrap(), 7);
//! assert_eq!(calls.load(Ordering::SeqCst), 2);
//! ```

mod builder;

pub use builder::RetryerBuilder;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::attempt::Attempt;
use crate::block::BlockStrategy;
use crate::cancel::CancellationToken;
use crate::error::{BoxError, ExecutionError, RetryError, RetryExhausted};
use crate::limiter::{AttemptTimeLimiter, Operation};
use crate::listener::RetryListener;
use crate::predicate::RejectionPredicate;
use crate::stop::StopStrategy;
use crate::wait::WaitStrategy;

/// Executes operations with retrying, waiting and stopping.
///
/// Immutable once built; cloning shares the strategies. A single retryer
/// may be called from many threads at once.
pub struct Retryer<T> {
    limiter: Arc<dyn AttemptTimeLimiter<T>>,
    stop: Arc<dyn StopStrategy<T>>,
    wait: Arc<dyn WaitStrategy<T>>,
    block: Arc<dyn BlockStrategy>,
    predicate: RejectionPredicate<T>,
    listeners: Arc<[Arc<dyn RetryListener<T>>]>,
}

impl<T: Send + 'static> Retryer<T> {
    /// Start configuring a retryer.
    pub fn builder() -> RetryerBuilder<T> {
        RetryerBuilder::new()
    }

    /// Run `operation` until it is accepted or retrying stops.
    ///
    /// Uses a fresh [`CancellationToken`] that nothing else can cancel.
    pub fn call<F, E>(&self, operation: F) -> Result<T, RetryError<T>>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.call_with_cancel(operation, &CancellationToken::new())
    }

    /// Run `operation`, abandoning the wait between attempts if `cancel` fires.
    pub fn call_with_cancel<F, E>(
        &self,
        operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<T>>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.run(&into_operation(operation), cancel)
    }

    /// Bind `operation` to this retryer for later, possibly remote, execution.
    pub fn wrap<F, E>(&self, operation: F) -> RetryerCallable<T>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        RetryerCallable {
            retryer: self.clone(),
            operation: into_operation(operation),
        }
    }

    fn run(&self, operation: &Operation<T>, cancel: &CancellationToken) -> Result<T, RetryError<T>> {
        let start = Instant::now();
        let mut attempt_number = 1u32;

        loop {
            let outcome = self.limiter.call(operation);
            let attempt = Attempt::new(outcome, attempt_number, start.elapsed());
            self.notify(&attempt);

            if !self.predicate.test(&attempt) {
                return attempt
                    .into_result()
                    .map_err(|cause| RetryError::ExecutionFailed(ExecutionError::new(cause)));
            }

            if self.stop.should_stop(&attempt) {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    attempts = attempt_number,
                    elapsed = ?attempt.delay_since_first_attempt(),
                    "retrying stopped"
                );
                return Err(RetryError::Exhausted(RetryExhausted::new(attempt)));
            }

            let sleep = self.wait.compute_sleep_time(&attempt);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt = attempt_number,
                failed = attempt.has_exception(),
                delay = ?sleep,
                "attempt rejected, retrying"
            );

            if self.block.block(sleep, cancel).is_err() {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempts = attempt_number, "retrying cancelled while waiting");
                return Err(RetryError::Exhausted(RetryExhausted::cancelled(attempt)));
            }

            attempt_number = next_attempt_number(attempt_number);
        }
    }

    fn notify(&self, attempt: &Attempt<T>) {
        for listener in self.listeners.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_retry(attempt)));
            if let Err(payload) = outcome {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    attempt = attempt.attempt_number(),
                    panic = panic_message(payload.as_ref()),
                    "retry listener panicked; continuing with remaining listeners"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = payload;
            }
        }
    }
}

/// Numbers increase strictly until `u32::MAX`, then stay there.
fn next_attempt_number(current: u32) -> u32 {
    current.saturating_add(1)
}

fn into_operation<T, F, E>(operation: F) -> Operation<T>
where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    Arc::new(move || operation().map_err(Into::into))
}

#[cfg(feature = "tracing")]
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

impl<T> Clone for Retryer<T> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            stop: Arc::clone(&self.stop),
            wait: Arc::clone(&self.wait),
            block: Arc::clone(&self.block),
            predicate: self.predicate.clone(),
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T> fmt::Debug for Retryer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retryer")
            .field("predicate", &self.predicate)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

/// An operation bound to a [`Retryer`], callable later from any thread.
///
/// # Examples
///
/// ```rust
/// use undertow::Retryer;
///
/// let callable = Retryer::<&str>::builder().build().wrap(|| Ok::<_, std::io::Error>("done"));
/// let handle = std::thread::spawn(move || callable.call());
/// assert_eq!(handle.join().unwrap().unwrap(), "done");
/// ```
pub struct RetryerCallable<T> {
    retryer: Retryer<T>,
    operation: Operation<T>,
}

impl<T: Send + 'static> RetryerCallable<T> {
    /// Run the bound operation through the bound retryer.
    pub fn call(&self) -> Result<T, RetryError<T>> {
        self.retryer.run(&self.operation, &CancellationToken::new())
    }

    /// Like [`call`](Self::call), observing `cancel` between attempts.
    pub fn call_with_cancel(&self, cancel: &CancellationToken) -> Result<T, RetryError<T>> {
        self.retryer.run(&self.operation, cancel)
    }
}

impl<T> Clone for RetryerCallable<T> {
    fn clone(&self) -> Self {
        Self {
            retryer: self.retryer.clone(),
            operation: Arc::clone(&self.operation),
        }
    }
}

impl<T> fmt::Debug for RetryerCallable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryerCallable")
            .field("retryer", &self.retryer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
