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

//! Parallel fan-out with aggregated completion.
//!
//! Layout: `executor.rs` (`FanOut`, dispatch and per-task delivery),
//! `aggregate.rs` (`FailureSet` accumulation and reduction), `error.rs`
//! (`CompositeFailure`).
//!
//! The executor knows nothing about the work it runs. Callers hand it a batch of
//! futures and a per-task handler; the handler is fed one outcome at a time by a
//! single collector, so any bookkeeping it does (mutating shared state,
//! recording failures) is sequential without locking.

pub mod aggregate;
pub mod error;
pub mod executor;

pub use aggregate::FailureSet;
pub use error::CompositeFailure;
pub use executor::{BatchReport, FanOut, TaskOutcome};
