use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use uuid::Uuid;
use vmattach_config::HookConfig;
use vmattach_core::{ErrorCode, VmOperation};
use vmattach_hook::{HookError, LifecycleExtension, MediaAttachHook};
use vmattach_test_support::fixtures::{self, EXISTING_ROOT_BACKEND};
use vmattach_test_support::mocks::{MemoryCatalog, ScriptedBus};

const TASKS: usize = 100;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundred_randomised_attaches_report_every_induced_failure() {
    let mut rng = rand::rng();
    let mut bus = ScriptedBus::new();
    let mut induced = BTreeSet::new();
    for index in 0..TASKS {
        let resource_id = fixtures::resource_id(index);
        bus = bus.delay(resource_id, Duration::from_millis(rng.random_range(0..25)));
        if index == 0 || rng.random_bool(0.35) {
            bus = bus.fail(
                resource_id,
                ErrorCode::operation_failed(resource_id.to_string()),
            );
            induced.insert(resource_id);
        }
    }
    let bus = Arc::new(bus);
    let hook = MediaAttachHook::new(
        Arc::clone(&bus),
        Arc::new(MemoryCatalog::new(fixtures::resources(TASKS))),
        HookConfig::default(),
    );
    let mut spec = fixtures::spec(VmOperation::Start, TASKS);

    let result = hook.before_instantiate(&mut spec).await;

    let Err(HookError::AttachFailed(failure)) = result else {
        panic!("expected attach failure");
    };
    let reported: Vec<Uuid> = failure
        .causes()
        .iter()
        .filter_map(|cause| cause.details().parse().ok())
        .collect();
    let unique: BTreeSet<Uuid> = reported.iter().copied().collect();
    assert_eq!(reported.len(), induced.len(), "duplicate or missing causes");
    assert_eq!(unique, induced);
    assert_eq!(bus.sent_count(), TASKS);

    for intent in &spec.attachments {
        if induced.contains(&intent.resource_id) {
            assert!(!intent.is_attached());
        } else {
            assert_eq!(intent.backend_id, Some(EXISTING_ROOT_BACKEND));
        }
    }
}
