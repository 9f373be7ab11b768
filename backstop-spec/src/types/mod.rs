//! Configuration and introspection types.

mod config;
mod info;

pub use config::{BackstopOptions, CoalesceConfig, MAX_COALESCE_WINDOW, RetryConfig};
pub use info::{ChannelPhase, ChannelSnapshot, RetryInfo};
