//! Type conversions for backstop errors.
//!
//! From implementations and `HasStatus` impls for common foreign error types.

use super::types::{ConfigError, OperationError};
#[cfg(feature = "reqwest")]
use super::types::HasStatus;

#[cfg(feature = "reqwest")]
impl HasStatus for reqwest::Error {
    fn status(&self) -> Option<u16> {
        reqwest::Error::status(self).map(|status| status.as_u16())
    }
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for OperationError {
    fn from(err: reqwest::Error) -> Self {
        match reqwest::Error::status(&err) {
            Some(status) => Self::http(status.as_u16(), err.to_string()),
            None => Self::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for OperationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(format!("JSON error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HasStatus;

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let config_err: ConfigError = json_err.into();
        assert!(matches!(config_err, ConfigError::Parse(_)));
    }

    #[test]
    fn serde_json_operation_errors_are_retryable() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let op_err: OperationError = json_err.into();
        assert_eq!(op_err.status(), None);
    }
}
