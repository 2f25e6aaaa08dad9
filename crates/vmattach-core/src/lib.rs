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

//! Backend-agnostic media attachment model and collaborator interfaces.
//!
//! Layout: `model` (lifecycle specs, intents, requests and replies), `service`
//! (`MessageBus` and `ResourceCatalog` seams), `error.rs` (catalog and model
//! errors).

pub mod error;
pub mod model;
pub mod service;

pub use error::{CatalogError, CatalogResult, ModelError};
pub use model::{
    AttachRequest, AttachmentIntent, BackendReply, BackendRequest, DetachRequest, Envelope,
    ErrorCode, HostInventory, LifecycleSpec, MediaFormat, ReplyPayload, ResourceRecord, ServiceId,
    StoreRef, VmInventory, VmOperation, VolumeInventory, VolumeSpec,
};
pub use service::{MessageBus, ResourceCatalog};
