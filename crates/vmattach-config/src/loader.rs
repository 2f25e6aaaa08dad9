//! Environment-driven configuration loading.

use tracing::debug;
use vmattach_core::VmOperation;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{HookConfig, LogOutput};

/// Overrides the bus service owning primary storage backends.
pub const ENV_PRIMARY_STORAGE_SERVICE: &str = "VMATTACH_PRIMARY_STORAGE_SERVICE";
/// Comma-separated list of operations that attach media.
pub const ENV_ATTACH_OPERATIONS: &str = "VMATTACH_ATTACH_OPERATIONS";
/// Fallback log level when `RUST_LOG` is unset.
pub const ENV_LOG_LEVEL: &str = "VMATTACH_LOG_LEVEL";
/// Log output format (`json` or `pretty`).
pub const ENV_LOG_FORMAT: &str = "VMATTACH_LOG_FORMAT";

impl HookConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but invalid.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary key lookup, starting from defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(service) = non_empty(lookup(ENV_PRIMARY_STORAGE_SERVICE)) {
            if service.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidField {
                    field: ENV_PRIMARY_STORAGE_SERVICE,
                    value: Some(service),
                    reason: "service name must not contain whitespace",
                });
            }
            config.primary_storage_service = service;
        }

        if let Some(raw) = lookup(ENV_ATTACH_OPERATIONS) {
            config.attach_operations = parse_operations(&raw)?;
        }

        if let Some(level) = non_empty(lookup(ENV_LOG_LEVEL)) {
            config.log_level = level;
        }

        if let Some(format) = non_empty(lookup(ENV_LOG_FORMAT)) {
            config.log_format = parse_log_output(&format)?;
        }

        debug!(
            service = %config.primary_storage_service,
            operations = ?config.attach_operations,
            "hook configuration loaded"
        );
        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_operations(raw: &str) -> ConfigResult<Vec<VmOperation>> {
    let mut operations = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let operation =
            name.parse::<VmOperation>()
                .map_err(|_| ConfigError::UnknownOperation {
                    field: ENV_ATTACH_OPERATIONS,
                    value: name.to_string(),
                })?;
        if !operations.contains(&operation) {
            operations.push(operation);
        }
    }
    Ok(operations)
}

fn parse_log_output(value: &str) -> ConfigResult<LogOutput> {
    match value.to_ascii_lowercase().as_str() {
        "json" => Ok(LogOutput::Json),
        "pretty" => Ok(LogOutput::Pretty),
        _ => Err(ConfigError::InvalidField {
            field: ENV_LOG_FORMAT,
            value: Some(value.to_string()),
            reason: "unsupported log format",
        }),
    }
}
