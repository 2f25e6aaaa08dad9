//! Continuation surface for host frameworks that cannot await the hook.
//!
//! # Design
//! - `Completion` is consumed by `succeed`, `fail` or `report`, so a batch can
//!   only be reported once.
//! - The lifecycle spec travels back with the result; attach results mutate
//!   it in place.
//! - A hook task that panics drops its `Completion`, which the waiting side
//!   observes as [`HookError::CompletionDropped`].

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::debug;
use vmattach_core::LifecycleSpec;

use crate::error::{HookError, HookResult};
use crate::extension::{LifecycleExtension, ReleaseSummary};

/// Spec handed back to the host together with the hook's result.
#[derive(Debug)]
pub struct HookOutcome<T> {
    /// Spec as left by the hook.
    pub spec: LifecycleSpec,
    /// Result of the transition step.
    pub result: HookResult<T>,
}

/// Sending half of a one-shot hook report.
#[derive(Debug)]
pub struct Completion<T> {
    sender: oneshot::Sender<HookOutcome<T>>,
}

/// Receiving half of a one-shot hook report.
#[derive(Debug)]
pub struct CompletionHandle<T> {
    receiver: oneshot::Receiver<HookOutcome<T>>,
}

impl<T> Completion<T> {
    /// Create a linked completion and handle.
    #[must_use]
    pub fn channel() -> (Self, CompletionHandle<T>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, CompletionHandle { receiver })
    }

    /// Report success.
    pub fn succeed(self, spec: LifecycleSpec, value: T) {
        self.report(spec, Ok(value));
    }

    /// Report failure.
    pub fn fail(self, spec: LifecycleSpec, error: HookError) {
        self.report(spec, Err(error));
    }

    /// Report a finished result.
    pub fn report(self, spec: LifecycleSpec, result: HookResult<T>) {
        if self.sender.send(HookOutcome { spec, result }).is_err() {
            debug!("hook completion receiver dropped before report");
        }
    }
}

impl<T> CompletionHandle<T> {
    /// Wait for the hook to report.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::CompletionDropped`] when the reporting side went
    /// away without reporting.
    pub async fn wait(self) -> HookResult<HookOutcome<T>> {
        self.receiver
            .await
            .map_err(|_| HookError::CompletionDropped)
    }
}

/// Run the attach path in the background and return immediately.
#[must_use]
pub fn spawn_before_instantiate<E>(
    extension: Arc<E>,
    mut spec: LifecycleSpec,
) -> CompletionHandle<()>
where
    E: LifecycleExtension + ?Sized + 'static,
{
    let (completion, handle) = Completion::channel();
    tokio::spawn(async move {
        let result = match extension.check_instantiate(&spec) {
            Ok(()) => extension.before_instantiate(&mut spec).await,
            Err(err) => Err(err),
        };
        completion.report(spec, result);
    });
    handle
}

/// Run the release path in the background and return immediately.
#[must_use]
pub fn spawn_before_release<E>(
    extension: Arc<E>,
    spec: LifecycleSpec,
) -> CompletionHandle<ReleaseSummary>
where
    E: LifecycleExtension + ?Sized + 'static,
{
    let (completion, handle) = Completion::channel();
    tokio::spawn(async move {
        let result = extension.before_release(&spec).await;
        completion.report(spec, result);
    });
    handle
}
