//! # Backstop - client-side resilience for eventually-consistent backends
//!
//! Backstop coordinates unreliable asynchronous work issued by application
//! screens against a remote backend. It has two independent, composable
//! components:
//!
//! - **[`RetryCoordinator`]**: bounded retries for idempotent mutating
//!   operations (bulk approve/reject and the like), keyed per item, with
//!   jittered exponential backoff, client-fault short-circuiting and
//!   cancellation.
//! - **[`RefreshCoalescer`]**: collapses bursts of change notifications
//!   into a single rate-limited re-fetch per channel. [`RefreshHub`] owns
//!   a feature's named channels and [`Subscription`] drives one from a
//!   notification stream.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use backstop::prelude::*;
//! use std::time::Duration;
//!
//! # async fn approve(id: u64) -> Result<(), OperationError> { Ok(()) }
//! #[tokio::main]
//! async fn main() {
//!     let approvals: RetryCoordinator<u64> = RetryCoordinator::new(RetryConfig::default());
//!     approvals.schedule_retry(
//!         42,
//!         || approve(42),
//!         RetryCallbacks::new()
//!             .on_success(|_| println!("approved"))
//!             .on_failure(|e| eprintln!("approve failed: {e}")),
//!     );
//!
//!     let feed = RefreshCoalescer::new("activity-feed", CoalesceConfig::default());
//!     feed.schedule_refresh(|| async { /* invalidate and re-fetch */ });
//!
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     approvals.cleanup();
//! }
//! ```
#![deny(unsafe_code)]

// Workspace split facade:
// - backstop-spec: configuration, errors, introspection types
// - backstop-core: timers, retry state machine, coalescing

pub use backstop_core::{coalesce, retry, utils};
pub use backstop_spec::{error, types};

pub use backstop_core::coalesce::{RefreshCoalescer, RefreshHub, Subscription, subscribe};
pub use backstop_core::retry::{
    BackoffSchedule, FixedJitter, JitterSource, RetryCallbacks, RetryCoordinator, SeededJitter,
    ThreadRngJitter,
};
pub use backstop_spec::error::{
    AttemptFailure, ConfigError, ErrorCategory, HasStatus, OperationError, RetryError,
};
pub use backstop_spec::types::{
    BackstopOptions, ChannelPhase, ChannelSnapshot, CoalesceConfig, RetryConfig, RetryInfo,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        BackstopOptions, CoalesceConfig, HasStatus, OperationError, RefreshCoalescer, RefreshHub,
        RetryCallbacks, RetryConfig, RetryCoordinator, RetryError, RetryInfo, Subscription,
    };
}
