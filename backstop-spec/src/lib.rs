//! backstop-spec
//!
//! Runtime-agnostic types for backstop.
//!
//! This crate intentionally contains only *spec-level* types: retry and
//! coalescing configuration, the error taxonomy consumed by retry decisions,
//! and read-only introspection snapshots. Timers, scheduling and the retry
//! state machine live in `backstop-core`.
#![deny(unsafe_code)]

pub mod error;
pub mod types;

pub use error::{
    AttemptFailure, ConfigError, ErrorCategory, HasStatus, OperationError, RetryError,
};
pub use types::{
    BackstopOptions, ChannelPhase, ChannelSnapshot, CoalesceConfig, RetryConfig, RetryInfo,
};
