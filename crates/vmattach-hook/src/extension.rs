//! Seam the host lifecycle framework registers hooks against.

use std::sync::Arc;

use async_trait::async_trait;
use vmattach_core::LifecycleSpec;

use crate::error::HookResult;

/// Extension points invoked around an instance's lifecycle transitions.
#[async_trait]
pub trait LifecycleExtension: Send + Sync {
    /// Validate the transition before any work starts.
    fn check_instantiate(&self, spec: &LifecycleSpec) -> HookResult<()>;
    /// Prepare resources before the instance is instantiated.
    async fn before_instantiate(&self, spec: &mut LifecycleSpec) -> HookResult<()>;
    /// Release resources before the instance is torn down.
    async fn before_release(&self, spec: &LifecycleSpec) -> HookResult<ReleaseSummary>;
}

/// Shared reference to a registered extension.
pub type SharedExtension = Arc<dyn LifecycleExtension>;

/// Per-batch counts reported by the release path.
///
/// Release never fails on a detach error, so these counts are the only place
/// a caller sees how many detaches went wrong.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    /// Detach requests the backend confirmed.
    pub detached: usize,
    /// Detach requests that failed and were logged.
    pub failed: usize,
}

impl ReleaseSummary {
    /// Whether every detach succeeded.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Total detach requests dispatched.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.detached + self.failed
    }
}
