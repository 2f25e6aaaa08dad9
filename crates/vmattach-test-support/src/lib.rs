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

//! Shared test helpers used across integration suites.
//!
//! Layout: `fixtures.rs` (ids and lifecycle specs), `mocks.rs` (scripted bus,
//! gated bus, in-memory catalog), `logs.rs` (log capture).

pub mod fixtures;
pub mod logs;
pub mod mocks;
