//! Outcome delivery for a retry sequence.
//!
//! A sequence reports exactly one outcome: a success value or a
//! [`RetryError`]. Callbacks are optional; an omitted callback drops the
//! corresponding outcome.

use crate::RetryError;

type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
type FailureFn<E> = Box<dyn FnOnce(RetryError<E>) + Send>;
type CompleteFn<T, E> = Box<dyn FnOnce(Result<T, RetryError<E>>) + Send>;

enum Delivery<T, E> {
    Split {
        on_success: Option<SuccessFn<T>>,
        on_failure: Option<FailureFn<E>>,
    },
    Complete(CompleteFn<T, E>),
}

/// Success/failure callbacks for [`RetryCoordinator::schedule_retry`].
///
/// [`RetryCoordinator::schedule_retry`]: super::RetryCoordinator::schedule_retry
pub struct RetryCallbacks<T, E> {
    delivery: Delivery<T, E>,
}

impl<T, E> Default for RetryCallbacks<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for RetryCallbacks<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.delivery {
            Delivery::Split {
                on_success,
                on_failure,
            } => f
                .debug_struct("RetryCallbacks")
                .field("on_success", &on_success.is_some())
                .field("on_failure", &on_failure.is_some())
                .finish(),
            Delivery::Complete(_) => f.debug_struct("RetryCallbacks").finish_non_exhaustive(),
        }
    }
}

impl<T, E> RetryCallbacks<T, E> {
    /// No callbacks; outcomes are dropped.
    pub fn new() -> Self {
        Self {
            delivery: Delivery::Split {
                on_success: None,
                on_failure: None,
            },
        }
    }

    /// A single callback receiving the whole outcome.
    pub fn on_complete(f: impl FnOnce(Result<T, RetryError<E>>) + Send + 'static) -> Self {
        Self {
            delivery: Delivery::Complete(Box::new(f)),
        }
    }

    /// Set the success callback.
    ///
    /// Replaces an `on_complete` callback if one was set.
    pub fn on_success(self, f: impl FnOnce(T) + Send + 'static) -> Self {
        let on_failure = self.into_failure_fn();
        Self {
            delivery: Delivery::Split {
                on_success: Some(Box::new(f)),
                on_failure,
            },
        }
    }

    /// Set the failure callback.
    ///
    /// Replaces an `on_complete` callback if one was set.
    pub fn on_failure(self, f: impl FnOnce(RetryError<E>) + Send + 'static) -> Self {
        let on_success = self.into_success_fn();
        Self {
            delivery: Delivery::Split {
                on_success,
                on_failure: Some(Box::new(f)),
            },
        }
    }

    pub(crate) fn succeed(self, value: T) {
        match self.delivery {
            Delivery::Split { on_success, .. } => {
                if let Some(f) = on_success {
                    f(value);
                }
            }
            Delivery::Complete(f) => f(Ok(value)),
        }
    }

    pub(crate) fn fail(self, error: RetryError<E>) {
        match self.delivery {
            Delivery::Split { on_failure, .. } => {
                if let Some(f) = on_failure {
                    f(error);
                }
            }
            Delivery::Complete(f) => f(Err(error)),
        }
    }

    fn into_success_fn(self) -> Option<SuccessFn<T>> {
        match self.delivery {
            Delivery::Split { on_success, .. } => on_success,
            Delivery::Complete(_) => None,
        }
    }

    fn into_failure_fn(self) -> Option<FailureFn<E>> {
        match self.delivery {
            Delivery::Split { on_failure, .. } => on_failure,
            Delivery::Complete(_) => None,
        }
    }
}
