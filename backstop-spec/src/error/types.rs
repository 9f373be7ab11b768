//! Core error types.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification used by retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The request itself was rejected (HTTP-style status in `[400, 500)`).
    /// Retrying cannot help.
    Client,
    /// Network failures, 5xx responses, timeouts and anything unclassified.
    Transient,
}

impl ErrorCategory {
    /// Classify an optional HTTP-style status code.
    ///
    /// Errors without a status are treated as transient.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(code) if (400..500).contains(&code) => Self::Client,
            _ => Self::Transient,
        }
    }

    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Errors that expose an optional HTTP-style status code.
///
/// This is the only thing the retry layer inspects on an operation's error.
pub trait HasStatus {
    /// HTTP-style status code, if the error carries one.
    fn status(&self) -> Option<u16>;

    fn category(&self) -> ErrorCategory {
        ErrorCategory::from_status(self.status())
    }

    fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl HasStatus for u16 {
    fn status(&self) -> Option<u16> {
        Some(*self)
    }
}

impl<T: HasStatus + ?Sized> HasStatus for &T {
    fn status(&self) -> Option<u16> {
        (**self).status()
    }
}

impl<T: HasStatus + ?Sized> HasStatus for Box<T> {
    fn status(&self) -> Option<u16> {
        (**self).status()
    }
}

impl<T: HasStatus + ?Sized> HasStatus for Arc<T> {
    fn status(&self) -> Option<u16> {
        (**self).status()
    }
}

/// General-purpose operation error for callers without their own error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    /// Backend answered with an HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl OperationError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl HasStatus for OperationError {
    fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network(_) | Self::Other(_) => None,
        }
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AttemptFailure<E> {
    /// The operation itself returned an error.
    #[error("{0}")]
    Operation(E),

    /// The attempt ran past the configured attempt timeout and was abandoned.
    #[error("Attempt timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
}

impl<E> AttemptFailure<E> {
    /// The operation's own error, if the attempt did not time out.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(error) => Some(error),
            Self::TimedOut(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

impl<E: HasStatus> HasStatus for AttemptFailure<E> {
    fn status(&self) -> Option<u16> {
        match self {
            Self::Operation(error) => error.status(),
            Self::TimedOut(_) => None,
        }
    }
}

/// Terminal outcome of a retry sequence that did not succeed.
///
/// Only two outcomes ever reach callers: a success value or one of these.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RetryError<E> {
    /// The operation failed with a client-fault error; no further attempts
    /// were made regardless of the remaining budget.
    #[error("Non-retryable failure: {0}")]
    Rejected(E),

    /// All attempts were spent. `last_error` is the final underlying cause,
    /// or `None` when the budget was already spent before scheduling.
    #[error("Maximum retry attempts exceeded ({attempts} attempts)")]
    Exhausted {
        attempts: u32,
        last_error: Option<AttemptFailure<E>>,
    },

    /// The retry sequence was cancelled before it produced an outcome.
    ///
    /// Callback-based scheduling never observes this variant; it is only
    /// returned by awaitable entry points whose sequence was torn down.
    #[error("Retry sequence cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The most recent underlying error, if one is known.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Rejected(error) => Some(error),
            Self::Exhausted { last_error, .. } => {
                last_error.as_ref().and_then(AttemptFailure::operation_error)
            }
            Self::Cancelled => None,
        }
    }
}

/// Invalid retry or coalescing configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("base_delay ({base_ms}ms) must not exceed max_delay ({max_ms}ms)")]
    DelayOrder { base_ms: u128, max_ms: u128 },

    #[error("attempt_timeout must be greater than zero")]
    ZeroTimeout,

    #[error("quiet_period ({quiet_ms}ms) must not exceed min_interval ({min_interval_ms}ms)")]
    QuietPeriodOrder { quiet_ms: u128, min_interval_ms: u128 },

    #[error("{field} ({ms}ms) exceeds the longest supported coalescing window")]
    WindowTooLong { field: &'static str, ms: u128 },

    #[error("Invalid configuration: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_band_is_exactly_4xx() {
        assert_eq!(ErrorCategory::from_status(Some(399)), ErrorCategory::Transient);
        assert_eq!(ErrorCategory::from_status(Some(400)), ErrorCategory::Client);
        assert_eq!(ErrorCategory::from_status(Some(404)), ErrorCategory::Client);
        assert_eq!(ErrorCategory::from_status(Some(499)), ErrorCategory::Client);
        assert_eq!(ErrorCategory::from_status(Some(500)), ErrorCategory::Transient);
        assert_eq!(ErrorCategory::from_status(None), ErrorCategory::Transient);
    }

    #[test]
    fn operation_error_classification() {
        assert!(!OperationError::http(403, "forbidden").is_retryable());
        assert!(OperationError::http(503, "unavailable").is_retryable());
        assert!(OperationError::network("connection reset").is_retryable());
        assert!(OperationError::other("boom").is_retryable());
    }

    #[test]
    fn timeouts_are_transient() {
        let failure: AttemptFailure<OperationError> =
            AttemptFailure::TimedOut(Duration::from_millis(250));
        assert!(failure.is_retryable());
        assert_eq!(failure.to_string(), "Attempt timed out after 250ms");
    }

    #[test]
    fn exhaustion_keeps_last_cause() {
        let err = RetryError::Exhausted {
            attempts: 3,
            last_error: Some(AttemptFailure::Operation(OperationError::http(502, "bad"))),
        };
        assert!(err.is_exhausted());
        assert_eq!(err.last_error(), Some(&OperationError::http(502, "bad")));
        assert_eq!(
            err.to_string(),
            "Maximum retry attempts exceeded (3 attempts)"
        );
    }
}
