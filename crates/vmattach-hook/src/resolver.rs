//! Turns attachment intents into backend-bound envelopes.
//!
//! # Design
//! - Endpoint selection is a pure function of the lifecycle spec.
//! - Catalog lookups happen up front so the per-task path never fails on a
//!   missing resource.

use std::collections::HashSet;

use uuid::Uuid;
use vmattach_core::{
    AttachRequest, BackendRequest, DetachRequest, Envelope, LifecycleSpec, MessageBus,
    ResourceCatalog, VmOperation,
};

use crate::error::{ContractViolation, HookError, HookResult};

/// Backend that receives media for the transition.
///
/// A new instance has no root volume yet, so its media goes to the backend
/// already chosen for the primary volume spec. Every other operation uses the
/// backend holding the existing root volume.
///
/// # Errors
///
/// Returns a [`ContractViolation`] when the lifecycle spec lacks the volume
/// the policy reads from.
pub fn target_backend(spec: &LifecycleSpec) -> Result<Uuid, ContractViolation> {
    let vm_id = spec.vm.id;
    if spec.operation == VmOperation::NewCreate {
        spec.primary_volume()
            .map(|volume| volume.backend_id)
            .ok_or(ContractViolation::MissingPrimaryVolume { vm_id })
    } else {
        spec.vm
            .root_volume
            .as_ref()
            .map(|volume| volume.backend_id)
            .ok_or(ContractViolation::MissingRootVolume { vm_id })
    }
}

/// Structural preconditions for the attach path.
///
/// # Errors
///
/// Returns the first [`ContractViolation`] found.
pub fn check_attach_preconditions(spec: &LifecycleSpec) -> Result<(), ContractViolation> {
    let mut seen = HashSet::with_capacity(spec.attachments.len());
    for intent in &spec.attachments {
        if intent.source_store_id.is_none() {
            return Err(ContractViolation::MissingSourceStore {
                resource_id: intent.resource_id,
            });
        }
        if !seen.insert(intent.resource_id) {
            return Err(ContractViolation::DuplicateResource {
                resource_id: intent.resource_id,
            });
        }
    }
    if spec.dest_host.is_none() {
        return Err(ContractViolation::MissingDestHost { vm_id: spec.vm.id });
    }
    target_backend(spec).map(|_| ())
}

/// One attach envelope per intent, in intent order.
///
/// # Errors
///
/// Returns [`HookError::Catalog`] when a lookup fails and
/// [`HookError::Contract`] when a resource or its store copy is missing.
pub async fn attach_envelopes<B, C>(
    bus: &B,
    catalog: &C,
    service: &str,
    spec: &LifecycleSpec,
    backend_id: Uuid,
) -> HookResult<Vec<Envelope>>
where
    B: MessageBus + ?Sized,
    C: ResourceCatalog + ?Sized,
{
    let dest_host_id = spec
        .dest_host
        .map(|host| host.id)
        .ok_or(ContractViolation::MissingDestHost { vm_id: spec.vm.id })?;
    let mut envelopes = Vec::with_capacity(spec.attachments.len());
    for intent in &spec.attachments {
        let resource_id = intent.resource_id;
        let store_id = intent
            .source_store_id
            .ok_or(ContractViolation::MissingSourceStore { resource_id })?;
        let resource = catalog
            .find_resource(resource_id)
            .await
            .map_err(|err| HookError::catalog("catalog.find_resource", err))?
            .ok_or(ContractViolation::ResourceNotFound { resource_id })?;
        let source = resource
            .store_ref(store_id)
            .cloned()
            .ok_or(ContractViolation::StoreRefMissing {
                resource_id,
                store_id,
            })?;
        envelopes.push(Envelope {
            target: bus.route(service, backend_id),
            request: BackendRequest::Attach(AttachRequest {
                backend_id,
                resource,
                source,
                vm_id: spec.vm.id,
                dest_host_id,
            }),
        });
    }
    Ok(envelopes)
}

/// One detach envelope per intent, in intent order.
pub fn detach_envelopes<B>(
    bus: &B,
    service: &str,
    spec: &LifecycleSpec,
    backend_id: Uuid,
) -> Vec<Envelope>
where
    B: MessageBus + ?Sized,
{
    spec.attachments
        .iter()
        .map(|intent| Envelope {
            target: bus.route(service, backend_id),
            request: BackendRequest::Detach(DetachRequest {
                backend_id,
                resource_id: intent.resource_id,
                vm_id: spec.vm.id,
            }),
        })
        .collect()
}
