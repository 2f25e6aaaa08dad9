//! Media attachment hook.
//!
//! # Design
//! - Attach and release share resolution and dispatch but not failure policy:
//!   attach failures fail the transition, detach failures are logged and
//!   swallowed.
//! - Replies are folded by the fan-out collector, so intents and the failure
//!   set are mutated sequentially without locks.
//! - Partial attach results stay on the intents even when the batch fails.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;
use vmattach_config::HookConfig;
use vmattach_core::model::codes;
use vmattach_core::{
    BackendReply, Envelope, ErrorCode, LifecycleSpec, MessageBus, ReplyPayload, ResourceCatalog,
};
use vmattach_fanout::{FailureSet, FanOut, TaskOutcome};
use vmattach_telemetry::{BatchPath, Metrics, batch_span};

use crate::error::{ContractViolation, HookError, HookResult};
use crate::extension::{LifecycleExtension, ReleaseSummary};
use crate::resolver;

/// Attaches removable media to primary storage before an instance starts and
/// detaches it before the instance is released.
pub struct MediaAttachHook<B, C> {
    bus: Arc<B>,
    catalog: Arc<C>,
    config: HookConfig,
    metrics: Option<Metrics>,
}

impl<B, C> MediaAttachHook<B, C>
where
    B: MessageBus + 'static,
    C: ResourceCatalog + 'static,
{
    /// Build a hook over the given collaborators.
    #[must_use]
    pub const fn new(bus: Arc<B>, catalog: Arc<C>, config: HookConfig) -> Self {
        Self {
            bus,
            catalog,
            config,
            metrics: None,
        }
    }

    /// Record batch and task counts into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Settings the hook runs with.
    #[must_use]
    pub const fn config(&self) -> &HookConfig {
        &self.config
    }

    fn needs_attach(&self, spec: &LifecycleSpec) -> bool {
        !spec.attachments.is_empty() && self.config.attaches_on(spec.operation)
    }

    fn batch_started(&self, path: BatchPath, size: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.batch_started(path, size);
        }
    }

    fn task_finished(&self, path: BatchPath, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.task_finished(path, outcome);
        }
    }
}

#[async_trait]
impl<B, C> LifecycleExtension for MediaAttachHook<B, C>
where
    B: MessageBus + 'static,
    C: ResourceCatalog + 'static,
{
    fn check_instantiate(&self, spec: &LifecycleSpec) -> HookResult<()> {
        if !self.needs_attach(spec) {
            return Ok(());
        }
        resolver::check_attach_preconditions(spec).map_err(HookError::from)
    }

    async fn before_instantiate(&self, spec: &mut LifecycleSpec) -> HookResult<()> {
        if !self.needs_attach(spec) {
            debug!(
                vm_id = %spec.vm.id,
                operation = %spec.operation,
                "no iso to attach"
            );
            return Ok(());
        }
        self.check_instantiate(spec)?;

        let backend_id = resolver::target_backend(spec)?;
        let envelopes = resolver::attach_envelopes(
            self.bus.as_ref(),
            self.catalog.as_ref(),
            &self.config.primary_storage_service,
            spec,
            backend_id,
        )
        .await?;
        let resource_ids: Vec<Uuid> = envelopes
            .iter()
            .map(|envelope| envelope.request.resource_id())
            .collect();

        info!(
            vm_id = %spec.vm.id,
            operation = %spec.operation,
            backend_id = %backend_id,
            count = envelopes.len(),
            "attaching iso to primary storage"
        );
        self.batch_started(BatchPath::Attach, envelopes.len());

        let span = batch_span(BatchPath::Attach, &spec.vm.id);
        let mut failures = FailureSet::new();
        let mut unmatched = None;
        let report = dispatch(&self.bus, envelopes)
            .run_all(|index, outcome| {
                let Some(&resource_id) = resource_ids.get(index) else {
                    return;
                };
                let (reply, label) = settle(outcome);
                self.task_finished(BatchPath::Attach, label);
                match reply {
                    BackendReply::Success(ReplyPayload {
                        install_path: Some(install_path),
                    }) => match spec.intent_mut(resource_id) {
                        Some(intent) => {
                            debug!(
                                resource_id = %resource_id,
                                backend_id = %backend_id,
                                install_path = %install_path,
                                "iso attached"
                            );
                            intent.mark_attached(install_path, backend_id);
                        }
                        None if unmatched.is_none() => unmatched = Some(resource_id),
                        None => {}
                    },
                    BackendReply::Success(ReplyPayload { install_path: None }) => {
                        failures.record(ErrorCode::operation_failed(format!(
                            "attach reply for iso {resource_id} carried no install path"
                        )));
                    }
                    BackendReply::Failure(error) => {
                        debug!(
                            resource_id = %resource_id,
                            backend_id = %backend_id,
                            error = %error,
                            "iso attach failed"
                        );
                        failures.record(error);
                    }
                }
            })
            .instrument(span)
            .await;

        info!(
            vm_id = %spec.vm.id,
            delivered = report.delivered,
            failed = failures.len(),
            "iso attach batch finished"
        );
        if let Some(resource_id) = unmatched {
            return Err(ContractViolation::UnmatchedReply { resource_id }.into());
        }
        failures
            .reduce(|first| {
                format!(
                    "unable to attach iso to primary storage, because: {}",
                    first.details()
                )
            })
            .map_err(HookError::AttachFailed)
    }

    async fn before_release(&self, spec: &LifecycleSpec) -> HookResult<ReleaseSummary> {
        if spec.attachments.is_empty() {
            debug!(vm_id = %spec.vm.id, "no iso to detach");
            return Ok(ReleaseSummary::default());
        }

        let backend_id = resolver::target_backend(spec)?;
        let envelopes = resolver::detach_envelopes(
            self.bus.as_ref(),
            &self.config.primary_storage_service,
            spec,
            backend_id,
        );
        let resource_ids: Vec<Uuid> = envelopes
            .iter()
            .map(|envelope| envelope.request.resource_id())
            .collect();

        info!(
            vm_id = %spec.vm.id,
            operation = %spec.operation,
            backend_id = %backend_id,
            count = envelopes.len(),
            "detaching iso from primary storage"
        );
        self.batch_started(BatchPath::Release, envelopes.len());

        let span = batch_span(BatchPath::Release, &spec.vm.id);
        let mut summary = ReleaseSummary::default();
        let report = dispatch(&self.bus, envelopes)
            .run_all(|index, outcome| {
                let Some(&resource_id) = resource_ids.get(index) else {
                    return;
                };
                let (reply, label) = settle(outcome);
                self.task_finished(BatchPath::Release, label);
                match reply {
                    BackendReply::Success(_) => {
                        debug!(resource_id = %resource_id, "iso detached");
                        summary.detached += 1;
                    }
                    BackendReply::Failure(error) => {
                        warn!(
                            vm_id = %spec.vm.id,
                            resource_id = %resource_id,
                            backend_id = %backend_id,
                            error = %error,
                            "failed to detach iso from primary storage"
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.inc_release_failure();
                        }
                        summary.failed += 1;
                    }
                }
            })
            .instrument(span)
            .await;

        info!(
            vm_id = %spec.vm.id,
            delivered = report.delivered,
            detached = summary.detached,
            failed = summary.failed,
            "iso release batch finished"
        );
        Ok(summary)
    }
}

/// One bus call per envelope, each owning a handle to the bus.
fn dispatch<B>(
    bus: &Arc<B>,
    envelopes: Vec<Envelope>,
) -> FanOut<impl Future<Output = BackendReply> + Send + use<B>>
where
    B: MessageBus + 'static,
{
    FanOut::new(envelopes.into_iter().map(|envelope| {
        let bus = Arc::clone(bus);
        async move { bus.send(envelope).await }
    }))
}

/// Reply for a delivered outcome plus its metrics label.
fn settle(outcome: TaskOutcome<BackendReply>) -> (BackendReply, &'static str) {
    match outcome {
        TaskOutcome::Completed(reply) => {
            let label = if reply.is_success() {
                "success"
            } else {
                "failure"
            };
            (reply, label)
        }
        TaskOutcome::Panicked { message } => (BackendReply::Failure(no_reply(message)), "panicked"),
        TaskOutcome::Cancelled => (
            BackendReply::Failure(no_reply("bus task was cancelled")),
            "cancelled",
        ),
    }
}

fn no_reply(details: impl Into<String>) -> ErrorCode {
    ErrorCode::new(codes::BUS_NO_REPLY, "bus task ended without a reply").with_details(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmattach_core::VmOperation;
    use vmattach_test_support::fixtures;
    use vmattach_test_support::mocks::{MemoryCatalog, ScriptedBus};

    fn hook(bus: ScriptedBus, resources: usize) -> MediaAttachHook<ScriptedBus, MemoryCatalog> {
        MediaAttachHook::new(
            Arc::new(bus),
            Arc::new(MemoryCatalog::new(fixtures::resources(resources))),
            HookConfig::default(),
        )
    }

    #[test]
    fn settle_labels_every_outcome() {
        let (reply, label) = settle(TaskOutcome::Completed(BackendReply::detached()));
        assert!(reply.is_success());
        assert_eq!(label, "success");

        let (reply, label) = settle(TaskOutcome::Panicked {
            message: "boom".to_string(),
        });
        assert_eq!(label, "panicked");
        assert!(matches!(
            reply,
            BackendReply::Failure(error) if error.code == codes::BUS_NO_REPLY && error.details() == "boom"
        ));

        let (_, label) = settle(TaskOutcome::Cancelled);
        assert_eq!(label, "cancelled");
    }

    #[tokio::test]
    async fn operations_outside_allow_list_skip_dispatch() -> HookResult<()> {
        let hook = hook(ScriptedBus::new(), 2);
        for operation in [VmOperation::Stop, VmOperation::Migrate, VmOperation::Destroy] {
            let mut spec = fixtures::spec(operation, 2);
            hook.check_instantiate(&spec)?;
            hook.before_instantiate(&mut spec).await?;
            assert!(spec.attachments.iter().all(|intent| !intent.is_attached()));
        }
        assert_eq!(hook.bus.sent_count(), 0);
        assert_eq!(hook.catalog.lookups(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn panicking_bus_task_becomes_attach_failure() {
        let failing = fixtures::resource_id(1);
        let hook = hook(ScriptedBus::new().panic_on(failing), 3);
        let mut spec = fixtures::spec(VmOperation::Start, 3);

        let failure = match hook.before_instantiate(&mut spec).await {
            Err(HookError::AttachFailed(failure)) => failure,
            other => panic!("expected attach failure, got {other:?}"),
        };
        assert_eq!(failure.causes().len(), 1);
        assert_eq!(failure.causes()[0].code, codes::BUS_NO_REPLY);
        assert_eq!(
            spec.attachments
                .iter()
                .filter(|intent| intent.is_attached())
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn metrics_track_both_paths() -> Result<(), Box<dyn std::error::Error>> {
        let metrics = Metrics::new()?;
        let failing = fixtures::resource_id(0);
        let hook = hook(
            ScriptedBus::new().fail(failing, ErrorCode::operation_failed("busy")),
            2,
        )
        .with_metrics(metrics.clone());

        let mut spec = fixtures::spec(VmOperation::Reboot, 2);
        assert!(hook.before_instantiate(&mut spec).await.is_err());
        let summary = hook.before_release(&spec).await?;
        assert_eq!(summary.failed, 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.attach_batches_total, 1);
        assert_eq!(snapshot.release_batches_total, 1);
        assert_eq!(snapshot.release_failures_total, 1);
        assert_eq!(snapshot.inflight_tasks, 0);
        assert_eq!(metrics.task_count(BatchPath::Attach, "success"), 1);
        assert_eq!(metrics.task_count(BatchPath::Attach, "failure"), 1);
        Ok(())
    }
}
