//! Prometheus-backed metrics for fan-out batches.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Labels distinguish the attach and release paths so their differing
//!   failure policies stay visible in dashboards.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Lifecycle path a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPath {
    /// Media attached before instantiation.
    Attach,
    /// Media released before teardown.
    Release,
}

impl BatchPath {
    /// Metric label for the path.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attach => "attach",
            Self::Release => "release",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    batches_total: IntCounterVec,
    tasks_total: IntCounterVec,
    inflight_tasks: IntGauge,
    release_failures_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Tasks dispatched but not yet delivered.
    pub inflight_tasks: i64,
    /// Attach batches started.
    pub attach_batches_total: u64,
    /// Release batches started.
    pub release_batches_total: u64,
    /// Release tasks whose failure was logged and swallowed.
    pub release_failures_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let batches_total = IntCounterVec::new(
            Opts::new("fanout_batches_total", "Fan-out batches started by path"),
            &["path"],
        )
        .map_err(|source| TelemetryError::Collector {
            operation: "metrics.build",
            metric: "fanout_batches_total",
            source,
        })?;
        let tasks_total = IntCounterVec::new(
            Opts::new(
                "fanout_tasks_total",
                "Fan-out tasks delivered by path and outcome",
            ),
            &["path", "outcome"],
        )
        .map_err(|source| TelemetryError::Collector {
            operation: "metrics.build",
            metric: "fanout_tasks_total",
            source,
        })?;
        let inflight_tasks = IntGauge::with_opts(Opts::new(
            "fanout_inflight_tasks",
            "Fan-out tasks dispatched and awaiting a reply",
        ))
        .map_err(|source| TelemetryError::Collector {
            operation: "metrics.build",
            metric: "fanout_inflight_tasks",
            source,
        })?;
        let release_failures_total = IntCounter::with_opts(Opts::new(
            "release_failures_total",
            "Detach failures swallowed on the release path",
        ))
        .map_err(|source| TelemetryError::Collector {
            operation: "metrics.build",
            metric: "release_failures_total",
            source,
        })?;

        register(&registry, "fanout_batches_total", batches_total.clone())?;
        register(&registry, "fanout_tasks_total", tasks_total.clone())?;
        register(&registry, "fanout_inflight_tasks", inflight_tasks.clone())?;
        register(
            &registry,
            "release_failures_total",
            release_failures_total.clone(),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                batches_total,
                tasks_total,
                inflight_tasks,
                release_failures_total,
            }),
        })
    }

    /// Record the start of a batch of `size` tasks.
    pub fn batch_started(&self, path: BatchPath, size: usize) {
        self.inner
            .batches_total
            .with_label_values(&[path.as_str()])
            .inc();
        self.inner
            .inflight_tasks
            .add(i64::try_from(size).unwrap_or(i64::MAX));
    }

    /// Record one delivered task outcome (`success`, `failure`, `panicked`).
    pub fn task_finished(&self, path: BatchPath, outcome: &str) {
        self.inner
            .tasks_total
            .with_label_values(&[path.as_str(), outcome])
            .inc();
        self.inner.inflight_tasks.dec();
    }

    /// Increment the swallowed release failure counter.
    pub fn inc_release_failure(&self) {
        self.inner.release_failures_total.inc();
    }

    /// Current count for one path/outcome pair.
    #[must_use]
    pub fn task_count(&self, path: BatchPath, outcome: &str) -> u64 {
        self.inner
            .tasks_total
            .with_label_values(&[path.as_str(), outcome])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Exposition {
                operation: "metrics.encode",
                source,
            })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::ExpositionText { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inflight_tasks: self.inner.inflight_tasks.get(),
            attach_batches_total: self
                .inner
                .batches_total
                .with_label_values(&[BatchPath::Attach.as_str()])
                .get(),
            release_batches_total: self
                .inner
                .batches_total
                .with_label_values(&[BatchPath::Release.as_str()])
                .get(),
            release_failures_total: self.inner.release_failures_total.get(),
        }
    }
}

fn register<C>(registry: &Registry, metric: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::Collector {
            operation: "metrics.register",
            metric,
            source,
        })
}
