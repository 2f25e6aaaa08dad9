//! Typed hook settings.

use serde::{Deserialize, Serialize};
use vmattach_core::VmOperation;

/// Bus service name owning primary storage backends.
pub const DEFAULT_PRIMARY_STORAGE_SERVICE: &str = "storage.primary";

/// Default log level when nothing else is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Operations that attach removable media before instantiation.
pub const DEFAULT_ATTACH_OPERATIONS: [VmOperation; 3] = [
    VmOperation::NewCreate,
    VmOperation::Start,
    VmOperation::Reboot,
];

/// Log output selected for the hook's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutput {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

impl LogOutput {
    /// Pretty output for debug builds, JSON otherwise.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Settings consumed by the attachment hook and its ambient stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    /// Bus service that owns primary storage backends.
    pub primary_storage_service: String,
    /// Operations for which media is attached before instantiation.
    ///
    /// This is an allow-list: operations missing here never attach media.
    pub attach_operations: Vec<VmOperation>,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogOutput,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            primary_storage_service: DEFAULT_PRIMARY_STORAGE_SERVICE.to_string(),
            attach_operations: DEFAULT_ATTACH_OPERATIONS.to_vec(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogOutput::infer(),
        }
    }
}

impl HookConfig {
    /// Whether `operation` attaches media before instantiation.
    #[must_use]
    pub fn attaches_on(&self, operation: VmOperation) -> bool {
        self.attach_operations.contains(&operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allow_list_covers_create_start_reboot_only() {
        let config = HookConfig::default();
        for operation in VmOperation::ALL {
            let expected = matches!(
                operation,
                VmOperation::NewCreate | VmOperation::Start | VmOperation::Reboot
            );
            assert_eq!(config.attaches_on(operation), expected, "{operation}");
        }
        assert_eq!(config.primary_storage_service, "storage.primary");
    }

    #[test]
    fn config_serialises_with_snake_case_labels() {
        let config = HookConfig {
            log_format: LogOutput::Json,
            ..HookConfig::default()
        };
        let value = serde_json::to_value(&config).expect("serialise config");
        assert_eq!(value["log_format"], "json");
        assert_eq!(value["attach_operations"][0], "new_create");
    }
}
