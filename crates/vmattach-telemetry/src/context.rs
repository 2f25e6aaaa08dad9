//! Span context for fan-out batches.
//!
//! # Design
//! - Every batch runs inside one span carrying its path, the instance and the
//!   build SHA, so per-task events inherit that context.

use std::fmt::Display;

use tracing::Span;

use crate::init::build_sha;
use crate::metrics::BatchPath;

/// Span covering one fan-out batch for `vm_id`.
#[must_use]
pub fn batch_span(path: BatchPath, vm_id: &dyn Display) -> Span {
    tracing::info_span!(
        "fanout_batch",
        path = path.as_str(),
        vm_id = %vm_id,
        build_sha = %build_sha()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_span_carries_path_instance_and_build() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = batch_span(BatchPath::Release, &"vm-1");
            let Some(metadata) = span.metadata() else {
                panic!("span disabled under a registry");
            };
            assert_eq!(metadata.name(), "fanout_batch");
            for field in ["path", "vm_id", "build_sha"] {
                assert!(metadata.fields().field(field).is_some(), "{field}");
            }
        });
    }
}
