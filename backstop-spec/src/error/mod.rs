//! Error handling types for backstop.
//!
//! This module is intentionally dependency-light and shared across crates.
//!
//! # Example
//!
//! ```rust,ignore
//! use backstop_spec::error::{ErrorCategory, HasStatus, OperationError};
//!
//! let error = OperationError::http(404, "Not found");
//! assert_eq!(error.category(), ErrorCategory::Client);
//! assert!(!error.is_retryable());
//! ```

mod conversions;
pub mod types;

pub use types::*;
