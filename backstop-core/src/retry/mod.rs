//! Retry module (ergonomic namespace)
//! - backoff.rs: delay schedule and injectable jitter
//! - callbacks.rs: success/failure delivery
//! - coordinator.rs: per-key retry state machine

pub mod backoff;
pub mod callbacks;
pub mod coordinator;
mod record;

pub use backoff::*;
pub use callbacks::RetryCallbacks;
pub use coordinator::RetryCoordinator;
