//! Error types for the media attachment model and its collaborators.

use std::error::Error;

use thiserror::Error;
use uuid::Uuid;

/// Failure raised by a resource catalog lookup.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backing store could not be queried.
    #[error("resource catalog unavailable")]
    Unavailable {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored record could not be decoded into a resource.
    #[error("stored resource record is invalid")]
    InvalidRecord {
        /// Resource whose record was rejected.
        resource_id: Uuid,
        /// Machine-readable reason for the rejection.
        reason: &'static str,
    },
}

/// Convenience alias for catalog lookups.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Failure parsing model values supplied as text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Operation name did not match a known lifecycle operation.
    #[error("unknown vm operation")]
    UnknownOperation {
        /// Value supplied by the caller.
        value: String,
    },
}
