//! Error types for configuration loading.

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Environment variable or field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Operation name did not match a known lifecycle operation.
    #[error("unknown lifecycle operation")]
    UnknownOperation {
        /// Environment variable or field that carried the name.
        field: &'static str,
        /// Operation name supplied by the caller.
        value: String,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_constant() {
        let invalid = ConfigError::InvalidField {
            field: "log_format",
            value: Some("xml".to_string()),
            reason: "unsupported log format",
        };
        assert_eq!(invalid.to_string(), "invalid configuration field");

        let unknown = ConfigError::UnknownOperation {
            field: "attach_operations",
            value: "hibernate".to_string(),
        };
        assert_eq!(unknown.to_string(), "unknown lifecycle operation");
    }
}
