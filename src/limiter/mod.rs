//! Bounding how long a single attempt may run.
//!
//! - [`NoTimeLimit`]: call the operation directly on the calling thread.
//! - [`FixedTimeLimit`]: run the operation on a [`WorkerPool`] worker and
//!   give up waiting after a fixed duration.
//!
//! # Abandoned workers
//!
//! A timed-out attempt is *not* forcibly stopped. Threads cannot be killed
//! safely, so the worker keeps running the operation to completion, its
//! result is discarded, and only then does the worker return to the pool.
//! An attempt that times out while still queued behind a busy pool is
//! abandoned instead: its job is skipped when a worker eventually picks it
//! up, so the operation never starts after its caller has moved on.
//! Operations that may hang should observe their own cancellation (for
//! example by capturing a [`CancellationToken`](crate::CancellationToken))
//! or they will hold a pool worker until they finish.

mod pool;

pub use pool::{WorkerPool, DEFAULT_KEEP_ALIVE, DEFAULT_MAX_WORKERS};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BoxError, TimeoutError, WorkerPanicked};

/// A retried operation, shareable with pool workers.
pub type Operation<T> = Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// Runs one attempt of an operation, possibly bounding its duration.
pub trait AttemptTimeLimiter<T>: Send + Sync {
    /// Invoke `operation` once.
    ///
    /// Fails with the operation's own cause, or with a limiter-specific
    /// cause such as [`TimeoutError`].
    fn call(&self, operation: &Operation<T>) -> Result<T, BoxError>;
}

impl<T, F> AttemptTimeLimiter<T> for F
where
    F: Fn(&Operation<T>) -> Result<T, BoxError> + Send + Sync,
{
    fn call(&self, operation: &Operation<T>) -> Result<T, BoxError> {
        self(operation)
    }
}

/// Calls the operation directly with no bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoTimeLimit;

impl<T> AttemptTimeLimiter<T> for NoTimeLimit {
    fn call(&self, operation: &Operation<T>) -> Result<T, BoxError> {
        operation()
    }
}

/// Runs each attempt on a pooled worker and waits at most `duration`.
///
/// # Examples
///
/// ```rust
/// use undertow::{AttemptTimeLimiter, FixedTimeLimit, Operation, TimeoutError};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let limiter = FixedTimeLimit::new(Duration::from_millis(20));
/// let slow: Operation<u32> = Arc::new(|| {
///     std::thread::sleep(Duration::from_millis(200));
///     Ok(1)
/// });
///
/// let err = limiter.call(&slow).unwrap_err();
/// assert!(err.downcast_ref::<TimeoutError>().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct FixedTimeLimit {
    duration: Duration,
    pool: WorkerPool,
}

impl FixedTimeLimit {
    /// Bound attempts to `duration` using the process-wide [`WorkerPool::shared`] pool.
    pub fn new(duration: Duration) -> Self {
        Self::with_pool(duration, WorkerPool::shared().clone())
    }

    /// Bound attempts to `duration` using a caller-supplied pool.
    pub fn with_pool(duration: Duration, pool: WorkerPool) -> Self {
        Self { duration, pool }
    }

    /// The per-attempt limit.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The pool attempts run on.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

impl<T: Send + 'static> AttemptTimeLimiter<T> for FixedTimeLimit {
    fn call(&self, operation: &Operation<T>) -> Result<T, BoxError> {
        let (tx, rx) = mpsc::sync_channel(1);
        let operation = Arc::clone(operation);
        // Claimed by whichever side gets there first: the worker starting the
        // operation, or the caller abandoning a job that is still queued.
        let claimed = Arc::new(AtomicBool::new(false));
        let job_claim = Arc::clone(&claimed);
        self.pool.execute(move || {
            if job_claim.swap(true, Ordering::AcqRel) {
                return;
            }
            // The receiver is gone if the attempt already timed out.
            let _ = tx.send(operation());
        })?;

        match rx.recv_timeout(self.duration) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                let started = claimed.swap(true, Ordering::AcqRel);
                #[cfg(feature = "tracing")]
                {
                    if started {
                        tracing::warn!(
                            limit = ?self.duration,
                            "attempt exceeded its time limit; worker left running until the operation returns"
                        );
                    } else {
                        tracing::warn!(
                            limit = ?self.duration,
                            "attempt exceeded its time limit before a worker was free; job abandoned"
                        );
                    }
                }
                #[cfg(not(feature = "tracing"))]
                let _ = started;
                Err(Box::new(TimeoutError::new(self.duration)))
            }
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(WorkerPanicked)),
        }
    }
}
