#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Lifecycle hook that attaches removable media to an instance's primary
//! storage before instantiation and releases it before teardown.
//!
//! Layout: `resolver.rs` (endpoint selection and request building), `hook.rs`
//! (attach and release paths over a fan-out batch), `extension.rs` (host
//! framework seam), `completion.rs` (one-shot continuations), `bootstrap.rs`
//! (config, logging, metrics), `error.rs` (`HookError`).

pub mod bootstrap;
pub mod completion;
pub mod error;
pub mod extension;
pub mod hook;
pub mod resolver;

pub use bootstrap::HookRuntime;
pub use completion::{
    Completion, CompletionHandle, HookOutcome, spawn_before_instantiate, spawn_before_release,
};
pub use error::{ContractViolation, HookError, HookResult};
pub use extension::{LifecycleExtension, ReleaseSummary, SharedExtension};
pub use hook::MediaAttachHook;
