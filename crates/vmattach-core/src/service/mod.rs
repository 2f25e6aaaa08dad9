//! Collaborator traits the attachment hook depends on.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CatalogResult;
use crate::model::{BackendReply, Envelope, ResourceRecord, ServiceId};

/// Transport that delivers a request to a backend service and returns its reply.
///
/// Implementations must produce exactly one reply per envelope. Transport-level
/// problems (timeouts, unreachable services) are reported as
/// [`BackendReply::Failure`], never by dropping the request.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Deliver the envelope and wait for the backend's reply.
    async fn send(&self, envelope: Envelope) -> BackendReply;

    /// Address of the `service` instance responsible for `resource_id`.
    fn route(&self, service: &str, resource_id: Uuid) -> ServiceId {
        ServiceId::for_resource(service, resource_id)
    }
}

/// Read-only lookup of catalog resources.
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// Fetch a resource and its known store locations.
    async fn find_resource(&self, id: Uuid) -> CatalogResult<Option<ResourceRecord>>;
}
