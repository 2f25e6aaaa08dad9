//! Deterministic identifiers and lifecycle spec builders.

use uuid::Uuid;
use vmattach_core::{
    AttachmentIntent, HostInventory, LifecycleSpec, MediaFormat, ResourceRecord, StoreRef,
    VmInventory, VmOperation, VolumeInventory, VolumeSpec,
};

/// Instance every fixture spec describes.
pub const VM_ID: Uuid = Uuid::from_u128(0x1000);
/// Destination host.
pub const HOST_ID: Uuid = Uuid::from_u128(0x2000);
/// Backend chosen for the root volume of a new instance.
pub const PENDING_ROOT_BACKEND: Uuid = Uuid::from_u128(0x3001);
/// Backend holding the existing root volume of a created instance.
pub const EXISTING_ROOT_BACKEND: Uuid = Uuid::from_u128(0x3002);
/// Backend chosen for a secondary data volume.
pub const DATA_BACKEND: Uuid = Uuid::from_u128(0x3003);
/// Store every fixture resource lives in.
pub const SOURCE_STORE: Uuid = Uuid::from_u128(0x4000);
/// Store that holds no fixture resources.
pub const OTHER_STORE: Uuid = Uuid::from_u128(0x4001);

/// Resource id for the `index`-th fixture resource.
#[must_use]
pub const fn resource_id(index: usize) -> Uuid {
    Uuid::from_u128(0x5000 + index as u128)
}

/// Catalog record for a fixture resource stored in [`SOURCE_STORE`].
#[must_use]
pub fn resource(id: Uuid) -> ResourceRecord {
    ResourceRecord {
        id,
        name: format!("media-{id}"),
        format: MediaFormat::Iso,
        size_bytes: 700 * 1024 * 1024,
        store_refs: vec![StoreRef {
            store_id: SOURCE_STORE,
            install_url: format!("sftp://store/{id}.iso"),
        }],
    }
}

/// Catalog records for the first `count` fixture resources.
#[must_use]
pub fn resources(count: usize) -> Vec<ResourceRecord> {
    (0..count).map(|index| resource(resource_id(index))).collect()
}

/// Intents for the first `count` fixture resources.
#[must_use]
pub fn intents(count: usize) -> Vec<AttachmentIntent> {
    (0..count)
        .map(|index| AttachmentIntent::new(resource_id(index), SOURCE_STORE))
        .collect()
}

/// Spec for `operation` carrying `count` intents.
///
/// Every fixture carries both a pending root volume spec (on
/// [`PENDING_ROOT_BACKEND`]) and an existing root volume (on
/// [`EXISTING_ROOT_BACKEND`]) so endpoint selection is observable.
#[must_use]
pub fn spec(operation: VmOperation, count: usize) -> LifecycleSpec {
    LifecycleSpec {
        operation,
        vm: VmInventory {
            id: VM_ID,
            name: "fixture-vm".to_string(),
            root_volume: Some(VolumeInventory {
                id: Uuid::from_u128(0x6000),
                backend_id: EXISTING_ROOT_BACKEND,
            }),
        },
        dest_host: Some(HostInventory { id: HOST_ID }),
        volume_specs: vec![
            VolumeSpec {
                backend_id: PENDING_ROOT_BACKEND,
                is_root: true,
                size_bytes: 20 * 1024 * 1024 * 1024,
            },
            VolumeSpec {
                backend_id: DATA_BACKEND,
                is_root: false,
                size_bytes: 1024 * 1024 * 1024,
            },
        ],
        attachments: intents(count),
    }
}

/// Spec for a brand-new instance: no root volume exists yet.
#[must_use]
pub fn new_create_spec(count: usize) -> LifecycleSpec {
    let mut spec = spec(VmOperation::NewCreate, count);
    spec.vm.root_volume = None;
    spec
}

/// Install path the scripted bus reports for an attach.
#[must_use]
pub fn install_path(backend_id: Uuid, resource_id: Uuid) -> String {
    format!("/primary/{backend_id}/iso/{resource_id}.iso")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_create_spec_has_no_root_volume() {
        let spec = new_create_spec(2);
        assert!(spec.vm.root_volume.is_none());
        assert_eq!(spec.attachments.len(), 2);
        assert_ne!(spec.attachments[0].resource_id, spec.attachments[1].resource_id);
    }

    #[test]
    fn resources_live_in_source_store() {
        for record in resources(3) {
            assert!(record.store_ref(SOURCE_STORE).is_some());
            assert!(record.store_ref(OTHER_STORE).is_none());
        }
    }
}
