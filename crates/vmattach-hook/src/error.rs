//! # Design
//!
//! - Contract violations are caller bugs; they surface before any dispatch.
//! - Remote failures only reach callers through the attach path's composite.
//! - Messages stay constant while context travels in fields.

use thiserror::Error;
use uuid::Uuid;
use vmattach_core::{CatalogError, ErrorCode};
use vmattach_fanout::CompositeFailure;

/// Result alias for hook operations.
pub type HookResult<T> = Result<T, HookError>;

/// Precondition the caller failed to uphold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// An intent did not name the store its resource lives in.
    #[error("attachment intent has no source store")]
    MissingSourceStore {
        /// Resource named by the intent.
        resource_id: Uuid,
    },
    /// The same resource appeared twice in one transition.
    #[error("resource is attached more than once in one transition")]
    DuplicateResource {
        /// Repeated resource.
        resource_id: Uuid,
    },
    /// The transition has no destination host.
    #[error("lifecycle spec has no destination host")]
    MissingDestHost {
        /// Instance being transitioned.
        vm_id: Uuid,
    },
    /// A new instance has no primary volume spec to take a backend from.
    #[error("new instance has no primary volume spec")]
    MissingPrimaryVolume {
        /// Instance being created.
        vm_id: Uuid,
    },
    /// An existing instance has no root volume to take a backend from.
    #[error("instance has no root volume")]
    MissingRootVolume {
        /// Instance being transitioned.
        vm_id: Uuid,
    },
    /// The catalog has no record of the resource.
    #[error("resource not found in catalog")]
    ResourceNotFound {
        /// Missing resource.
        resource_id: Uuid,
    },
    /// The resource has no copy in the store the intent points at.
    #[error("resource has no copy in the source store")]
    StoreRefMissing {
        /// Resource being attached.
        resource_id: Uuid,
        /// Store named by the intent.
        store_id: Uuid,
    },
    /// A reply arrived for a resource no intent names.
    #[error("reply did not match any attachment intent")]
    UnmatchedReply {
        /// Resource named by the reply.
        resource_id: Uuid,
    },
}

/// Errors surfaced by the attachment hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// The lifecycle spec broke a precondition.
    #[error("lifecycle spec violates the hook contract")]
    Contract(#[from] ContractViolation),
    /// Resolving a resource failed.
    #[error("resource catalog lookup failed")]
    Catalog {
        /// Operation identifier.
        operation: &'static str,
        /// Source catalog error.
        source: CatalogError,
    },
    /// One or more attach requests failed.
    #[error(transparent)]
    AttachFailed(CompositeFailure<ErrorCode>),
    /// The hook task ended without reporting.
    #[error("hook completion was dropped before reporting")]
    CompletionDropped,
    /// Loading configuration failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: vmattach_config::ConfigError,
    },
    /// Installing telemetry failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: vmattach_telemetry::TelemetryError,
    },
}

impl HookError {
    /// Remote failures behind an attach error, in arrival order.
    #[must_use]
    pub fn causes(&self) -> &[ErrorCode] {
        match self {
            Self::AttachFailed(failure) => failure.causes(),
            _ => &[],
        }
    }

    pub(crate) const fn catalog(operation: &'static str, source: CatalogError) -> Self {
        Self::Catalog { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn attach_failure_displays_headline_and_exposes_causes() {
        let cause = ErrorCode::operation_failed("disk full");
        let err = HookError::AttachFailed(CompositeFailure::new(
            "unable to attach iso to primary storage, because: disk full".to_string(),
            vec![cause.clone()],
        ));
        assert_eq!(
            err.to_string(),
            "unable to attach iso to primary storage, because: disk full"
        );
        assert_eq!(err.causes(), &[cause]);
        assert!(err.source().is_some());
    }

    #[test]
    fn contract_and_catalog_errors_keep_context() {
        let resource_id = Uuid::from_u128(9);
        let err = HookError::from(ContractViolation::ResourceNotFound { resource_id });
        assert_eq!(err.to_string(), "lifecycle spec violates the hook contract");
        assert!(err.causes().is_empty());
        assert!(matches!(
            err,
            HookError::Contract(ContractViolation::ResourceNotFound { resource_id: id }) if id == resource_id
        ));

        let err = HookError::catalog(
            "catalog.find_resource",
            CatalogError::Unavailable {
                operation: "catalog.find_resource",
                source: Box::new(io::Error::other("offline")),
            },
        );
        assert_eq!(err.to_string(), "resource catalog lookup failed");
        assert!(err.source().is_some());
    }
}
