//! Cancellation signal threaded through blocking waits.
//!
//! A [`CancellationToken`] replaces thread interruption: the retry loop
//! hands it to the [`BlockStrategy`](crate::BlockStrategy), which parks on
//! it and wakes immediately when another thread calls
//! [`cancel`](CancellationToken::cancel). Cancellation is sticky: once set it
//! stays observable through [`is_cancelled`](CancellationToken::is_cancelled).

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::Cancelled;

/// A cloneable, thread-safe cancellation flag with wakeup.
///
/// # Examples
///
/// ```rust
/// use undertow::CancellationToken;
/// use std::time::Duration;
///
/// let token = CancellationToken::new();
/// let remote = token.clone();
/// std::thread::spawn(move || remote.cancel());
///
/// // Returns early once the other thread cancels.
/// let _ = token.sleep(Duration::from_secs(30));
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: Mutex<bool>,
    wakeup: Condvar,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token and wake every thread sleeping on it.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.wakeup.notify_all();
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Park the current thread for `duration` unless cancelled first.
    ///
    /// Returns `Err(Cancelled)` as soon as the token is cancelled, including
    /// when it was already cancelled on entry.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let deadline = Instant::now().checked_add(duration);
        let mut cancelled = self.inner.cancelled.lock();
        loop {
            if *cancelled {
                return Err(Cancelled);
            }
            match deadline {
                // Too far in the future to represent: wait for cancellation only.
                None => self.inner.wakeup.wait(&mut cancelled),
                Some(deadline) => {
                    if self
                        .inner
                        .wakeup
                        .wait_until(&mut cancelled, deadline)
                        .timed_out()
                    {
                        return if *cancelled { Err(Cancelled) } else { Ok(()) };
                    }
                }
            }
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
