//! backstop-core
//!
//! Timer-driven coordination of unreliable asynchronous work against an
//! eventually-consistent backend:
//!
//! - [`retry`]: bounded, jittered, per-key retries of idempotent operations.
//! - [`coalesce`]: rate-limited refreshes collapsed from bursts of change
//!   notifications.
//!
//! Every scheduling entry point spawns onto the ambient Tokio runtime and
//! must be called from within one.
#![deny(unsafe_code)]

pub mod coalesce;
pub mod retry;
pub mod utils;

pub use backstop_spec::error::{
    AttemptFailure, ConfigError, ErrorCategory, HasStatus, OperationError, RetryError,
};
pub use backstop_spec::types::{
    BackstopOptions, ChannelPhase, ChannelSnapshot, CoalesceConfig, RetryConfig, RetryInfo,
};
