//! Declarative retry configuration.
//!
//! [`RetryConfig`] is plain data describing a retryer, suitable for loading
//! from a config file when the `serde` feature is enabled. Converting it
//! into a [`RetryerBuilder`] validates every parameter through the strategy
//! constructors, so an invalid file fails at load time rather than at the
//! first retry.
//!
//! # Example
//!
//! ```rust
//! use undertow::{RetryConfig, StopConfig, WaitConfig};
//! use std::time::Duration;
//!
//! let config = RetryConfig {
//!     stop: StopConfig::AfterAttempt { attempts: 4 },
//!     wait: WaitConfig::Fixed { delay: Duration::from_millis(1) },
//!     attempt_timeout: None,
//!     retry_on_error: true,
//! };
//!
//! let retryer = config.build::<u8>().unwrap();
//! let err = retryer.call(|| Err::<u8, _>("unavailable")).unwrap_err();
//! assert_eq!(err.into_exhausted().unwrap().attempt_count(), 4);
//! ```

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::limiter::FixedTimeLimit;
use crate::retryer::{Retryer, RetryerBuilder};
use crate::stop::{NeverStop, StopAfterAttempt, StopAfterDelay};
use crate::wait::{
    ExponentialWait, FibonacciWait, FixedWait, IncrementingWait, NoWait, RandomWait,
};

/// When to give up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum StopConfig {
    /// Retry until an attempt is accepted.
    #[default]
    Never,
    /// Stop once `attempts` attempts have been made.
    AfterAttempt {
        /// Maximum number of attempts; must be at least 1.
        attempts: u32,
    },
    /// Stop once `delay` has elapsed since the first attempt.
    AfterDelay {
        /// Elapsed-time budget.
        delay: Duration,
    },
}

/// How long to wait between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum WaitConfig {
    /// Retry immediately.
    #[default]
    None,
    /// Same delay every time.
    Fixed {
        /// The delay.
        delay: Duration,
    },
    /// Uniform in `[min, max]`.
    Random {
        /// Lower bound.
        min: Duration,
        /// Upper bound; must not be below `min`.
        max: Duration,
    },
    /// `initial + increment * (attempt - 1)`.
    Incrementing {
        /// First delay.
        initial: Duration,
        /// Growth per attempt.
        increment: Duration,
    },
    /// `multiplier * 2^attempt`, capped at `max`.
    Exponential {
        /// Base unit; must be non-zero.
        multiplier: Duration,
        /// Cap.
        max: Duration,
    },
    /// `multiplier * fib(attempt)`, capped at `max`.
    Fibonacci {
        /// Base unit; must be non-zero.
        multiplier: Duration,
        /// Cap.
        max: Duration,
    },
}

/// A complete, serializable retryer description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// When to give up.
    pub stop: StopConfig,
    /// Delay between attempts.
    pub wait: WaitConfig,
    /// Per-attempt time limit; `None` runs attempts on the calling thread.
    pub attempt_timeout: Option<Duration>,
    /// Retry every failed attempt.
    pub retry_on_error: bool,
}

impl RetryConfig {
    /// A builder preloaded with this configuration.
    ///
    /// Further retry conditions and listeners can be added to the result,
    /// but its stop, wait and (if `attempt_timeout` is set) limiter slots are
    /// already taken.
    pub fn to_builder<T: Send + 'static>(&self) -> Result<RetryerBuilder<T>, BuildError> {
        let mut builder = RetryerBuilder::new();
        builder = apply_stop(self.stop, builder)?;
        builder = apply_wait(self.wait, builder)?;
        if let Some(limit) = self.attempt_timeout {
            builder = builder.with_attempt_time_limiter(FixedTimeLimit::new(limit))?;
        }
        if self.retry_on_error {
            builder = builder.retry_if_exception();
        }
        Ok(builder)
    }

    /// Build a retryer directly from this configuration.
    pub fn build<T: Send + 'static>(&self) -> Result<Retryer<T>, BuildError> {
        Ok(self.to_builder()?.build())
    }
}

fn apply_stop<T: Send + 'static>(
    stop: StopConfig,
    builder: RetryerBuilder<T>,
) -> Result<RetryerBuilder<T>, BuildError> {
    match stop {
        StopConfig::Never => builder.with_stop_strategy(NeverStop),
        StopConfig::AfterAttempt { attempts } => {
            builder.with_stop_strategy(StopAfterAttempt::new(attempts)?)
        }
        StopConfig::AfterDelay { delay } => builder.with_stop_strategy(StopAfterDelay::new(delay)),
    }
}

fn apply_wait<T: Send + 'static>(
    wait: WaitConfig,
    builder: RetryerBuilder<T>,
) -> Result<RetryerBuilder<T>, BuildError> {
    match wait {
        WaitConfig::None => builder.with_wait_strategy(NoWait),
        WaitConfig::Fixed { delay } => builder.with_wait_strategy(FixedWait::new(delay)),
        WaitConfig::Random { min, max } => builder.with_wait_strategy(RandomWait::new(min, max)?),
        WaitConfig::Incrementing { initial, increment } => {
            builder.with_wait_strategy(IncrementingWait::new(initial, increment))
        }
        WaitConfig::Exponential { multiplier, max } => {
            builder.with_wait_strategy(ExponentialWait::new(multiplier, max)?)
        }
        WaitConfig::Fibonacci { multiplier, max } => {
            builder.with_wait_strategy(FibonacciWait::new(multiplier, max)?)
        }
    }
}

#[cfg(feature = "proptest")]
use proptest::prelude::*;

#[cfg(feature = "proptest")]
fn millis(range: std::ops::Range<u64>) -> impl Strategy<Value = Duration> {
    range.prop_map(Duration::from_millis)
}

#[cfg(feature = "proptest")]
impl Arbitrary for StopConfig {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(StopConfig::Never),
            (1u32..100).prop_map(|attempts| StopConfig::AfterAttempt { attempts }),
            millis(0..60_000).prop_map(|delay| StopConfig::AfterDelay { delay }),
        ]
        .boxed()
    }
}

#[cfg(feature = "proptest")]
impl Arbitrary for WaitConfig {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(WaitConfig::None),
            millis(0..10_000).prop_map(|delay| WaitConfig::Fixed { delay }),
            (millis(0..5_000), millis(0..5_000)).prop_map(|(a, b)| WaitConfig::Random {
                min: a.min(b),
                max: a.max(b),
            }),
            (millis(0..1_000), millis(0..1_000))
                .prop_map(|(initial, increment)| WaitConfig::Incrementing { initial, increment }),
            (millis(1..1_000), millis(0..60_000))
                .prop_map(|(multiplier, max)| WaitConfig::Exponential { multiplier, max }),
            (millis(1..1_000), millis(0..60_000))
                .prop_map(|(multiplier, max)| WaitConfig::Fibonacci { multiplier, max }),
        ]
        .boxed()
    }
}
