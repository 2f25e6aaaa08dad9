//! Error types for telemetry operations.
//!
//! # Design
//! - Each variant names the operation that failed; collector failures also
//!   name the metric so a bad registration points at its `fanout_*` family.
//! - Messages stay constant while context travels in fields.

use std::string::FromUtf8Error;

use prometheus::Error as PrometheusError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing logging or exposing fan-out metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber could not be installed.
    #[error("tracing subscriber could not be installed")]
    Subscriber {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying subscriber error.
        source: TryInitError,
    },
    /// A fan-out collector could not be built or registered.
    #[error("fan-out metric collector setup failed")]
    Collector {
        /// Operation identifier (`metrics.build` or `metrics.register`).
        operation: &'static str,
        /// Metric family the collector belongs to.
        metric: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Encoding the registry in the text exposition format failed.
    #[error("metrics exposition failed")]
    Exposition {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The encoded exposition was not valid UTF-8.
    #[error("metrics exposition was not valid utf-8")]
    ExpositionText {
        /// Underlying conversion error.
        source: FromUtf8Error,
    },
}

impl TelemetryError {
    /// Operation that failed.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Subscriber { operation, .. }
            | Self::Collector { operation, .. }
            | Self::Exposition { operation, .. } => *operation,
            Self::ExpositionText { .. } => "metrics.decode",
        }
    }
}
