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

//! Configuration for the media attachment hook.
//!
//! Layout: `model.rs` (typed settings and defaults), `loader.rs` (environment
//! parsing), `error.rs` (`ConfigError`).

pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    ENV_ATTACH_OPERATIONS, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_PRIMARY_STORAGE_SERVICE,
};
pub use model::{DEFAULT_PRIMARY_STORAGE_SERVICE, HookConfig, LogOutput};
