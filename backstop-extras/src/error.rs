//! Error types for backstop-extras

use thiserror::Error;

/// Errors that can occur in backstop-extras
#[derive(Error, Debug)]
pub enum ExtrasError {
    /// Telemetry initialization error
    #[error("Telemetry initialization error: {0}")]
    TelemetryInit(String),
}

/// Result type for backstop-extras operations
pub type Result<T> = std::result::Result<T, ExtrasError>;
