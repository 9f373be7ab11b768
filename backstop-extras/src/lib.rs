//! # Backstop Extras
//!
//! Optional utilities for the `backstop` resilience layer:
//!
//! - **Telemetry** (`telemetry` feature): installs a `tracing-subscriber`
//!   stack scoped to backstop's targets, with text or JSON output on the
//!   console and/or a non-blocking log file.
//!
//! ## Example
//!
//! ```rust,ignore
//! use backstop_extras::telemetry::{init_subscriber, OutputFormat, SubscriberConfig};
//!
//! let config = SubscriberConfig::builder()
//!     .log_level(tracing::Level::DEBUG)
//!     .output_format(OutputFormat::Json)
//!     .build();
//! let _guard = init_subscriber(config)?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// Re-export the facade so extras users need a single dependency
pub use backstop;

/// Telemetry and tracing utilities
#[cfg(feature = "telemetry")]
pub mod telemetry;

/// Error types for backstop-extras
#[cfg(feature = "telemetry")]
pub mod error;
