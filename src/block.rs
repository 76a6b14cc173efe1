//! Performing the delay between attempts.

use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::error::Cancelled;

/// Blocks the calling thread for a computed delay.
///
/// Implementations must return `Err(Cancelled)` promptly once `cancel`
/// fires; the retry loop then ends with an exhausted, cancelled outcome.
pub trait BlockStrategy: Send + Sync {
    /// Block for `duration`, or until `cancel` is cancelled.
    fn block(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled>;
}

impl<F> BlockStrategy for F
where
    F: Fn(Duration, &CancellationToken) -> Result<(), Cancelled> + Send + Sync,
{
    fn block(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
        self(duration, cancel)
    }
}

/// Parks the thread on the cancellation token for the full delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SleepBlockStrategy;

impl BlockStrategy for SleepBlockStrategy {
    fn block(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
        if duration.is_zero() {
            // Still honor a cancellation that already happened.
            return if cancel.is_cancelled() {
                Err(Cancelled)
            } else {
                Ok(())
            };
        }
        cancel.sleep(duration)
    }
}
