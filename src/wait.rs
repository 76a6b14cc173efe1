//! Computing the delay before the next attempt.
//!
//! Wait strategies are pure functions of the rejected [`Attempt`]:
//!
//! - **NoWait**: retry immediately
//! - **Fixed**: same delay every time
//! - **Random**: uniform in `[min, max]`, resampled every time
//! - **Incrementing**: `initial + increment * (n - 1)`
//! - **Exponential**: `multiplier * 2^n`, capped
//! - **Fibonacci**: `multiplier * fib(n)`, capped
//! - **Exception**: derived from the failure cause
//! - **Join**: sum of several strategies
//!
//! All arithmetic saturates: an overflowing delay becomes the strategy's
//! maximum rather than wrapping or panicking.

use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use rand::Rng;

use crate::attempt::{Attempt, Outcome};
use crate::error::{find_cause, BuildError};

/// Computes how long to wait after a rejected attempt.
pub trait WaitStrategy<T>: Send + Sync {
    /// The delay before the attempt following `attempt`.
    fn compute_sleep_time(&self, attempt: &Attempt<T>) -> Duration;
}

impl<T, F> WaitStrategy<T> for F
where
    F: Fn(&Attempt<T>) -> Duration + Send + Sync,
{
    fn compute_sleep_time(&self, attempt: &Attempt<T>) -> Duration {
        self(attempt)
    }
}

/// Retry immediately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoWait;

impl<T> WaitStrategy<T> for NoWait {
    fn compute_sleep_time(&self, _attempt: &Attempt<T>) -> Duration {
        Duration::ZERO
    }
}

/// Wait the same delay after every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWait {
    delay: Duration,
}

impl FixedWait {
    /// Wait `delay` between attempts.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl<T> WaitStrategy<T> for FixedWait {
    fn compute_sleep_time(&self, _attempt: &Attempt<T>) -> Duration {
        self.delay
    }
}

/// Wait a uniformly random delay in `[min, max]`.
///
/// # Examples
///
/// ```rust
/// use undertow::{Attempt, RandomWait, WaitStrategy};
/// use std::time::Duration;
///
/// let wait = RandomWait::new(Duration::from_millis(100), Duration::from_millis(200)).unwrap();
/// let delay = wait.compute_sleep_time(&Attempt::from_result((), 1, Duration::ZERO));
/// assert!(delay >= Duration::from_millis(100) && delay <= Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomWait {
    min: Duration,
    max: Duration,
}

impl RandomWait {
    /// Random delay between `min` and `max` inclusive. Fails if `min > max`.
    pub fn new(min: Duration, max: Duration) -> Result<Self, BuildError> {
        if min > max {
            return Err(BuildError::invalid(format!(
                "min ({:?}) must not exceed max ({:?})",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// Random delay between zero and `max` inclusive.
    pub fn up_to(max: Duration) -> Self {
        Self {
            min: Duration::ZERO,
            max,
        }
    }
}

impl<T> WaitStrategy<T> for RandomWait {
    fn compute_sleep_time(&self, _attempt: &Attempt<T>) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::rng().random_range(self.min..=self.max)
    }
}

/// Wait `initial`, then grow by `increment` after each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementingWait {
    initial: Duration,
    increment: Duration,
}

impl IncrementingWait {
    /// Delay = initial + increment * (attempt - 1).
    pub fn new(initial: Duration, increment: Duration) -> Self {
        Self { initial, increment }
    }
}

impl<T> WaitStrategy<T> for IncrementingWait {
    fn compute_sleep_time(&self, attempt: &Attempt<T>) -> Duration {
        let steps = attempt.attempt_number().saturating_sub(1);
        self.initial
            .saturating_add(self.increment.saturating_mul(steps))
    }
}

/// Wait `multiplier * 2^attempt`, never more than `max`.
///
/// The default multiplier is one millisecond and the default maximum is
/// unbounded, giving 2ms, 4ms, 8ms, ... for attempts 1, 2, 3, ...
///
/// # Examples
///
/// ```rust
/// use undertow::{Attempt, ExponentialWait, WaitStrategy};
/// use std::time::Duration;
///
/// let wait = ExponentialWait::with_max(Duration::from_millis(40));
/// let delay = |n| wait.compute_sleep_time(&Attempt::from_result((), n, Duration::ZERO));
///
/// assert_eq!(delay(3), Duration::from_millis(8));
/// assert_eq!(delay(6), Duration::from_millis(40)); // capped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialWait {
    multiplier: Duration,
    max: Duration,
}

impl ExponentialWait {
    /// Exponential backoff with an explicit multiplier and cap.
    ///
    /// Fails if `multiplier` is zero.
    pub fn new(multiplier: Duration, max: Duration) -> Result<Self, BuildError> {
        if multiplier.is_zero() {
            return Err(BuildError::invalid("multiplier must be > 0"));
        }
        Ok(Self { multiplier, max })
    }

    /// One-millisecond multiplier, capped at `max`.
    pub fn with_max(max: Duration) -> Self {
        Self {
            multiplier: Duration::from_millis(1),
            max,
        }
    }
}

impl Default for ExponentialWait {
    fn default() -> Self {
        Self::with_max(Duration::MAX)
    }
}

impl<T> WaitStrategy<T> for ExponentialWait {
    fn compute_sleep_time(&self, attempt: &Attempt<T>) -> Duration {
        let factor = 2u128.checked_pow(attempt.attempt_number());
        scale_capped(self.multiplier, factor, self.max)
    }
}

/// Wait `multiplier * fib(attempt)`, never more than `max`.
///
/// With the defaults (one millisecond, unbounded) attempts 1..=6 wait
/// 1, 1, 2, 3, 5 and 8 milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FibonacciWait {
    multiplier: Duration,
    max: Duration,
}

impl FibonacciWait {
    /// Fibonacci backoff with an explicit multiplier and cap.
    ///
    /// Fails if `multiplier` is zero.
    pub fn new(multiplier: Duration, max: Duration) -> Result<Self, BuildError> {
        if multiplier.is_zero() {
            return Err(BuildError::invalid("multiplier must be > 0"));
        }
        Ok(Self { multiplier, max })
    }

    /// One-millisecond multiplier, capped at `max`.
    pub fn with_max(max: Duration) -> Self {
        Self {
            multiplier: Duration::from_millis(1),
            max,
        }
    }
}

impl Default for FibonacciWait {
    fn default() -> Self {
        Self::with_max(Duration::MAX)
    }
}

impl<T> WaitStrategy<T> for FibonacciWait {
    fn compute_sleep_time(&self, attempt: &Attempt<T>) -> Duration {
        let factor = fibonacci(attempt.attempt_number());
        scale_capped(self.multiplier, factor, self.max)
    }
}

/// Wait according to the failure cause when it is an `X`; otherwise zero.
///
/// Useful when an error carries a server-provided retry hint.
///
/// # Examples
///
/// ```rust
/// use undertow::{Attempt, ExceptionWait, WaitStrategy};
/// use std::time::Duration;
/// use std::fmt;
///
/// #[derive(Debug)]
/// struct RetryAfter(u64);
/// impl fmt::Display for RetryAfter {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         write!(f, "retry after {}ms", self.0)
///     }
/// }
/// impl std::error::Error for RetryAfter {}
///
/// let wait = ExceptionWait::new(|e: &RetryAfter| Duration::from_millis(e.0));
/// let attempt = Attempt::<()>::from_failure(RetryAfter(29), 1, Duration::ZERO);
/// assert_eq!(wait.compute_sleep_time(&attempt), Duration::from_millis(29));
/// ```
pub struct ExceptionWait<X, F> {
    function: F,
    _cause: PhantomData<fn(&X)>,
}

impl<X, F> ExceptionWait<X, F>
where
    X: Error + 'static,
    F: Fn(&X) -> Duration + Send + Sync,
{
    /// Compute the delay from causes of type `X` with `function`.
    pub fn new(function: F) -> Self {
        Self {
            function,
            _cause: PhantomData,
        }
    }
}

impl<T, X, F> WaitStrategy<T> for ExceptionWait<X, F>
where
    X: Error + 'static,
    F: Fn(&X) -> Duration + Send + Sync,
{
    fn compute_sleep_time(&self, attempt: &Attempt<T>) -> Duration {
        match attempt.outcome() {
            Outcome::Failure(cause) => find_cause::<X>(cause.as_ref())
                .map(|x| (self.function)(x))
                .unwrap_or(Duration::ZERO),
            Outcome::Result(_) => Duration::ZERO,
        }
    }
}

impl<X, F> fmt::Debug for ExceptionWait<X, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionWait")
            .field("cause", &std::any::type_name::<X>())
            .finish()
    }
}

/// Sum of several wait strategies.
///
/// # Examples
///
/// ```rust
/// use undertow::{Attempt, FibonacciWait, FixedWait, JoinWait, WaitStrategy};
/// use std::time::Duration;
///
/// let wait = JoinWait::<()>::new(vec![
///     Box::new(FixedWait::new(Duration::from_millis(50))),
///     Box::new(FibonacciWait::default()),
/// ])
/// .unwrap();
///
/// let attempt = Attempt::from_result((), 4, Duration::ZERO);
/// assert_eq!(wait.compute_sleep_time(&attempt), Duration::from_millis(53));
/// ```
pub struct JoinWait<T> {
    strategies: Vec<Box<dyn WaitStrategy<T>>>,
}

impl<T> JoinWait<T> {
    /// Join `strategies`. Fails if the list is empty.
    pub fn new(strategies: Vec<Box<dyn WaitStrategy<T>>>) -> Result<Self, BuildError> {
        if strategies.is_empty() {
            return Err(BuildError::invalid("Must have at least one wait strategy"));
        }
        Ok(Self { strategies })
    }

    /// Join strategies that may be absent.
    ///
    /// Any `None` is rejected here, at construction, with
    /// [`BuildError::NullWaitStrategy`].
    pub fn from_optional(
        strategies: Vec<Option<Box<dyn WaitStrategy<T>>>>,
    ) -> Result<Self, BuildError> {
        let strategies = strategies
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(BuildError::NullWaitStrategy)?;
        Self::new(strategies)
    }

    /// Number of joined strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Always false: a join has at least one component.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl<T> WaitStrategy<T> for JoinWait<T> {
    fn compute_sleep_time(&self, attempt: &Attempt<T>) -> Duration {
        self.strategies
            .iter()
            .map(|s| s.compute_sleep_time(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl<T> fmt::Debug for JoinWait<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinWait")
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

/// `multiplier * factor`, or `max` if the product overflows or exceeds it.
fn scale_capped(multiplier: Duration, factor: Option<u128>, max: Duration) -> Duration {
    let nanos = factor.and_then(|f| multiplier.as_nanos().checked_mul(f));
    match nanos {
        Some(n) if n < max.as_nanos() => duration_from_nanos(n),
        _ => max,
    }
}

fn duration_from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
    Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)
}

/// Calculate the nth Fibonacci number, or `None` once it overflows.
fn fibonacci(n: u32) -> Option<u128> {
    if n == 0 {
        return Some(0);
    }
    let mut a = 0u128;
    let mut b = 1u128;
    for _ in 1..n {
        let next = a.checked_add(b)?;
        a = b;
        b = next;
    }
    Some(b)
}
