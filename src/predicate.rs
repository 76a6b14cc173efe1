//! Deciding whether an attempt should be retried.
//!
//! A [`RejectionPredicate`] is an OR of sub-predicates. An attempt is
//! *rejected* (retried) when any sub-predicate matches it; with no
//! sub-predicates every attempt is accepted, so the first outcome is final.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::attempt::{Attempt, Outcome};
use crate::error::find_cause;

type SubPredicate<T> = Arc<dyn Fn(&Attempt<T>) -> bool + Send + Sync>;

/// OR-composition of retry conditions over an [`Attempt`].
///
/// # Examples
///
/// ```rust
/// use undertow::{Attempt, RejectionPredicate};
/// use std::io;
/// use std::time::Duration;
///
/// let predicate = RejectionPredicate::<Option<u32>>::new()
///     .or_result(|value| value.is_none())
///     .or_error_type::<io::Error>();
///
/// assert!(predicate.test(&Attempt::from_result(None, 1, Duration::ZERO)));
/// assert!(!predicate.test(&Attempt::from_result(Some(3), 1, Duration::ZERO)));
/// assert!(predicate.test(&Attempt::from_failure(io::Error::other("x"), 1, Duration::ZERO)));
/// ```
pub struct RejectionPredicate<T> {
    predicates: Vec<SubPredicate<T>>,
}

impl<T: 'static> RejectionPredicate<T> {
    /// A predicate with no conditions: nothing is ever retried.
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Retry when the failure cause, or any error in its source chain, is an `X`.
    ///
    /// Never matches an attempt that produced a value.
    pub fn or_error_type<X>(self) -> Self
    where
        X: Error + 'static,
    {
        self.or_attempt(|attempt: &Attempt<T>| match attempt.outcome() {
            Outcome::Failure(cause) => find_cause::<X>(cause.as_ref()).is_some(),
            Outcome::Result(_) => false,
        })
    }

    /// Retry when `predicate` holds for the failure cause.
    pub fn or_error<P>(self, predicate: P) -> Self
    where
        P: Fn(&(dyn Error + Send + Sync + 'static)) -> bool + Send + Sync + 'static,
    {
        self.or_attempt(move |attempt: &Attempt<T>| match attempt.outcome() {
            Outcome::Failure(cause) => predicate(cause.as_ref()),
            Outcome::Result(_) => false,
        })
    }

    /// Retry on every failure.
    pub fn or_any_error(self) -> Self {
        self.or_attempt(|attempt: &Attempt<T>| attempt.has_exception())
    }

    /// Retry when `predicate` holds for the produced value.
    ///
    /// Only evaluated for attempts that produced a value.
    pub fn or_result<P>(self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.or_attempt(move |attempt: &Attempt<T>| match attempt.outcome() {
            Outcome::Result(value) => predicate(value),
            Outcome::Failure(_) => false,
        })
    }

    /// Retry when `predicate` holds for the whole attempt.
    pub fn or_attempt<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Attempt<T>) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// Returns true if the attempt should be retried.
    pub fn test(&self, attempt: &Attempt<T>) -> bool {
        self.predicates.iter().any(|p| p(attempt))
    }

    /// Returns true if no conditions are registered.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Number of registered conditions.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }
}

impl<T: 'static> Default for RejectionPredicate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RejectionPredicate<T> {
    fn clone(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
        }
    }
}

impl<T> fmt::Debug for RejectionPredicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RejectionPredicate")
            .field("conditions", &self.predicates.len())
            .finish()
    }
}
