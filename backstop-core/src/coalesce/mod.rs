//! Refresh coalescing
//! - coalescer.rs: one channel's debounce-with-floor timer
//! - hub.rs: named channels owned by one feature
//! - subscription.rs: drive a channel from a notification stream

pub mod coalescer;
pub mod hub;
pub mod subscription;

pub use coalescer::RefreshCoalescer;
pub use hub::RefreshHub;
pub use subscription::{Subscription, subscribe};
