//! Process-level wiring: configuration, logging, metrics.

use std::sync::Arc;

use tracing::info;
use vmattach_config::{HookConfig, LogOutput};
use vmattach_core::{MessageBus, ResourceCatalog};
use vmattach_telemetry::{LogFormat, LoggingConfig, Metrics, init_logging};

use crate::error::{HookError, HookResult};
use crate::hook::MediaAttachHook;

/// Configuration and telemetry shared by every hook in the process.
#[derive(Clone)]
pub struct HookRuntime {
    config: HookConfig,
    metrics: Metrics,
}

impl HookRuntime {
    /// Load configuration from the environment, then install telemetry.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or telemetry cannot be
    /// installed.
    pub fn from_env() -> HookResult<Self> {
        let config = HookConfig::from_env().map_err(|source| HookError::Config {
            operation: "config.from_env",
            source,
        })?;
        Self::install(config)
    }

    /// Install logging and metrics for an already loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the global subscriber is already set or metrics
    /// cannot be registered.
    pub fn install(config: HookConfig) -> HookResult<Self> {
        init_logging(&LoggingConfig {
            level: &config.log_level,
            format: log_format(config.log_format),
            build_sha: option_env!("VMATTACH_BUILD_SHA").unwrap_or("dev"),
        })
        .map_err(|source| HookError::Telemetry {
            operation: "telemetry.init_logging",
            source,
        })?;
        let runtime = Self::without_logging(config)?;
        info!(
            service = %runtime.config.primary_storage_service,
            attach_operations = ?runtime.config.attach_operations,
            "media attach hook runtime ready"
        );
        Ok(runtime)
    }

    /// Build metrics for `config` without touching the global subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if metrics cannot be registered.
    pub fn without_logging(config: HookConfig) -> HookResult<Self> {
        let metrics = Metrics::new().map_err(|source| HookError::Telemetry {
            operation: "telemetry.metrics",
            source,
        })?;
        Ok(Self { config, metrics })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &HookConfig {
        &self.config
    }

    /// Shared metrics registry.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Build a hook wired to this runtime's configuration and metrics.
    #[must_use]
    pub fn hook<B, C>(&self, bus: Arc<B>, catalog: Arc<C>) -> MediaAttachHook<B, C>
    where
        B: MessageBus + 'static,
        C: ResourceCatalog + 'static,
    {
        MediaAttachHook::new(bus, catalog, self.config.clone()).with_metrics(self.metrics.clone())
    }
}

const fn log_format(output: LogOutput) -> LogFormat {
    match output {
        LogOutput::Json => LogFormat::Json,
        LogOutput::Pretty => LogFormat::Pretty,
    }
}
