use std::sync::Arc;

use vmattach_config::HookConfig;
use vmattach_core::{BackendRequest, ErrorCode, VmOperation};
use vmattach_hook::{
    ContractViolation, HookError, HookResult, LifecycleExtension, MediaAttachHook, ReleaseSummary,
    spawn_before_release,
};
use vmattach_telemetry::Metrics;
use vmattach_test_support::fixtures::{self, EXISTING_ROOT_BACKEND, PENDING_ROOT_BACKEND};
use vmattach_test_support::logs::LogCapture;
use vmattach_test_support::mocks::{MemoryCatalog, ScriptedBus};

const DETACH_WARNING: &str = "failed to detach iso from primary storage";

fn hook_over(bus: &Arc<ScriptedBus>) -> MediaAttachHook<ScriptedBus, MemoryCatalog> {
    MediaAttachHook::new(
        Arc::clone(bus),
        Arc::new(MemoryCatalog::new(Vec::new())),
        HookConfig::default(),
    )
}

#[tokio::test]
async fn all_detach_failures_still_release_and_each_is_logged() -> HookResult<()> {
    let (logs, _guard) = LogCapture::install();
    let bus = Arc::new(ScriptedBus::new().fail_all(ErrorCode::operation_failed("backend gone")));
    let hook = hook_over(&bus);
    let spec = fixtures::spec(VmOperation::Stop, 4);

    let summary = hook.before_release(&spec).await?;

    assert_eq!(
        summary,
        ReleaseSummary {
            detached: 0,
            failed: 4
        }
    );
    assert_eq!(bus.sent_count(), 4);
    let warnings = logs.matching(&["WARN", DETACH_WARNING]);
    assert_eq!(warnings.len(), 4, "{warnings:#?}");
    assert_eq!(
        logs.matching(&[DETACH_WARNING, "fanout_batch", "release"]).len(),
        4
    );
    for intent in &spec.attachments {
        let id = intent.resource_id.to_string();
        assert_eq!(
            logs.matching(&[DETACH_WARNING, id.as_str(), "backend gone"])
                .len(),
            1
        );
    }
    Ok(())
}

#[tokio::test]
async fn release_without_intents_succeeds_without_dispatch() -> HookResult<()> {
    let bus = Arc::new(ScriptedBus::new());
    let hook = hook_over(&bus);
    let mut spec = fixtures::spec(VmOperation::Destroy, 0);
    spec.vm.root_volume = None;

    let summary = hook.before_release(&spec).await?;

    assert_eq!(summary, ReleaseSummary::default());
    assert_eq!(bus.sent_count(), 0);
    Ok(())
}

#[tokio::test]
async fn release_with_intents_but_no_backend_fails_before_dispatch() {
    let bus = Arc::new(ScriptedBus::new());
    let hook = hook_over(&bus);
    let mut stop = fixtures::spec(VmOperation::Stop, 2);
    stop.vm.root_volume = None;
    let mut create = fixtures::new_create_spec(2);
    create.volume_specs.clear();

    let stop_result = hook.before_release(&stop).await;
    let create_result = hook.before_release(&create).await;

    assert!(matches!(
        stop_result,
        Err(HookError::Contract(ContractViolation::MissingRootVolume { vm_id }))
            if vm_id == fixtures::VM_ID
    ));
    assert!(matches!(
        create_result,
        Err(HookError::Contract(ContractViolation::MissingPrimaryVolume { .. }))
    ));
    assert_eq!(bus.sent_count(), 0);
}

#[tokio::test]
async fn mixed_release_counts_each_outcome() -> HookResult<()> {
    let (logs, _guard) = LogCapture::install();
    let failing = fixtures::resource_id(1);
    let bus = Arc::new(ScriptedBus::new().fail(failing, ErrorCode::operation_failed("busy")));
    let metrics = Metrics::new().map_err(|source| HookError::Telemetry {
        operation: "telemetry.metrics",
        source,
    })?;
    let hook = hook_over(&bus).with_metrics(metrics.clone());
    let spec = fixtures::spec(VmOperation::Stop, 3);

    let summary = hook.before_release(&spec).await?;

    assert_eq!(summary.detached, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(logs.matching(&["WARN", DETACH_WARNING]).len(), 1);
    assert_eq!(metrics.snapshot().release_failures_total, 1);
    Ok(())
}

#[tokio::test]
async fn release_uses_same_endpoint_policy_as_attach() -> HookResult<()> {
    let bus = Arc::new(ScriptedBus::new());
    let hook = hook_over(&bus);

    hook.before_release(&fixtures::spec(VmOperation::NewCreate, 1))
        .await?;
    hook.before_release(&fixtures::spec(VmOperation::Stop, 1))
        .await?;

    let backends: Vec<_> = bus
        .sent()
        .iter()
        .map(|envelope| {
            assert!(matches!(envelope.request, BackendRequest::Detach(_)));
            envelope.request.backend_id()
        })
        .collect();
    assert_eq!(backends, vec![PENDING_ROOT_BACKEND, EXISTING_ROOT_BACKEND]);
    Ok(())
}

#[tokio::test]
async fn panicking_detach_is_logged_not_fatal() -> HookResult<()> {
    let bus = Arc::new(ScriptedBus::new().panic_on(fixtures::resource_id(0)));
    let hook = Arc::new(hook_over(&bus));

    let outcome = spawn_before_release(hook, fixtures::spec(VmOperation::Stop, 2))
        .wait()
        .await?;

    let summary = outcome.result?;
    assert_eq!(summary.detached, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(outcome.spec.attachments.len(), 2);
    Ok(())
}
