//! Observing attempts as they happen.

use crate::attempt::Attempt;

/// Side-effecting observer notified once per attempt, in registration order.
///
/// Listeners see every attempt, accepted or rejected, before the retry
/// decision is made. A listener that panics is isolated: the panic is
/// caught, logged when the `tracing` feature is enabled, and the remaining
/// listeners still run.
pub trait RetryListener<T>: Send + Sync {
    /// Called with each attempt as soon as it completes.
    fn on_retry(&self, attempt: &Attempt<T>);
}

impl<T, F> RetryListener<T> for F
where
    F: Fn(&Attempt<T>) + Send + Sync,
{
    fn on_retry(&self, attempt: &Attempt<T>) {
        self(attempt)
    }
}

/// Logs every attempt at `info` level.
///
/// # Examples
///
/// ```rust
/// use undertow::{RetryerBuilder, TracingListener};
///
/// let retryer = RetryerBuilder::<u32>::new()
///     .with_retry_listener(TracingListener::new("fetch-config"))
///     .build();
/// assert_eq!(retryer.call(|| Ok::<_, std::io::Error>(3)).unwrap(), 3);
/// ```
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy)]
pub struct TracingListener {
    name: &'static str,
}

#[cfg(feature = "tracing")]
impl TracingListener {
    /// A listener tagging its events with `name`.
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[cfg(feature = "tracing")]
impl<T> RetryListener<T> for TracingListener {
    fn on_retry(&self, attempt: &Attempt<T>) {
        match attempt.exception_cause() {
            Ok(cause) => tracing::info!(
                operation = self.name,
                attempt = attempt.attempt_number(),
                elapsed = ?attempt.delay_since_first_attempt(),
                error = %cause,
                "attempt failed"
            ),
            Err(_) => tracing::info!(
                operation = self.name,
                attempt = attempt.attempt_number(),
                elapsed = ?attempt.delay_since_first_attempt(),
                "attempt returned a value"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[test]
    fn test_closure_listener_records_attempts() {
        let seen = Mutex::new(Vec::new());
        let listener = |attempt: &Attempt<u8>| seen.lock().push(attempt.attempt_number());

        for n in 1..=3 {
            RetryListener::on_retry(&listener, &Attempt::from_result(0, n, Duration::ZERO));
        }
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }
}
