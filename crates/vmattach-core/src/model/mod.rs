//! Core media attachment domain types shared across the workspace.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

/// Lifecycle operation an instance is currently undergoing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmOperation {
    /// First boot of a freshly created instance.
    NewCreate,
    /// Start a stopped instance.
    Start,
    /// Stop a running instance.
    Stop,
    /// Reboot a running instance.
    Reboot,
    /// Live or cold migration to another host.
    Migrate,
    /// Pause a running instance.
    Pause,
    /// Resume a paused instance.
    Resume,
    /// Destroy the instance while keeping its record.
    Destroy,
    /// Permanently remove the instance.
    Expunge,
    /// Attach removable media to a running instance.
    AttachIso,
    /// Detach removable media from a running instance.
    DetachIso,
    /// Replace the instance's root image.
    ChangeImage,
}

impl VmOperation {
    /// Every known operation, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::NewCreate,
        Self::Start,
        Self::Stop,
        Self::Reboot,
        Self::Migrate,
        Self::Pause,
        Self::Resume,
        Self::Destroy,
        Self::Expunge,
        Self::AttachIso,
        Self::DetachIso,
        Self::ChangeImage,
    ];

    /// Stable machine-readable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewCreate => "new_create",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reboot => "reboot",
            Self::Migrate => "migrate",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Destroy => "destroy",
            Self::Expunge => "expunge",
            Self::AttachIso => "attach_iso",
            Self::DetachIso => "detach_iso",
            Self::ChangeImage => "change_image",
        }
    }
}

impl Display for VmOperation {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for VmOperation {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalised = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|operation| operation.as_str() == normalised)
            .ok_or_else(|| ModelError::UnknownOperation {
                value: value.to_string(),
            })
    }
}

/// Request to make one removable resource available during a transition.
///
/// `install_path` and `backend_id` stay empty until the backend confirms the
/// attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentIntent {
    /// Resource (image) being attached.
    pub resource_id: Uuid,
    /// Store the resource currently lives in.
    pub source_store_id: Option<Uuid>,
    /// Location of the resource on the backend once attached.
    pub install_path: Option<String>,
    /// Backend that holds the attached copy.
    pub backend_id: Option<Uuid>,
}

impl AttachmentIntent {
    /// Intent for a resource sourced from the given store.
    #[must_use]
    pub const fn new(resource_id: Uuid, source_store_id: Uuid) -> Self {
        Self {
            resource_id,
            source_store_id: Some(source_store_id),
            install_path: None,
            backend_id: None,
        }
    }

    /// Whether a backend has confirmed the attach.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.install_path.is_some() && self.backend_id.is_some()
    }

    /// Record the backend's confirmation.
    pub fn mark_attached(&mut self, install_path: String, backend_id: Uuid) {
        self.install_path = Some(install_path);
        self.backend_id = Some(backend_id);
    }
}

/// Volume the instance is about to receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Backend selected to host the volume.
    pub backend_id: Uuid,
    /// Whether this is the instance's root volume.
    pub is_root: bool,
    /// Requested capacity.
    pub size_bytes: u64,
}

/// Volume that already exists for the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInventory {
    /// Volume identifier.
    pub id: Uuid,
    /// Backend currently holding the volume.
    pub backend_id: Uuid,
}

/// Snapshot of the instance undergoing the transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInventory {
    /// Instance identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Existing root volume; absent before the first boot.
    pub root_volume: Option<VolumeInventory>,
}

/// Host the instance will run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInventory {
    /// Host identifier.
    pub id: Uuid,
}

/// Everything the hook needs to know about one lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSpec {
    /// Operation currently running.
    pub operation: VmOperation,
    /// Instance undergoing the transition.
    pub vm: VmInventory,
    /// Host selected for the instance, when one applies.
    pub dest_host: Option<HostInventory>,
    /// Volumes requested for the instance; the first entry is the root volume.
    #[serde(default)]
    pub volume_specs: Vec<VolumeSpec>,
    /// Removable media to attach or release.
    #[serde(default)]
    pub attachments: Vec<AttachmentIntent>,
}

impl LifecycleSpec {
    /// Volume spec for the root volume being created.
    #[must_use]
    pub fn primary_volume(&self) -> Option<&VolumeSpec> {
        self.volume_specs.first()
    }

    /// Mutable access to the intent for a resource.
    pub fn intent_mut(&mut self, resource_id: Uuid) -> Option<&mut AttachmentIntent> {
        self.attachments
            .iter_mut()
            .find(|intent| intent.resource_id == resource_id)
    }
}

/// Media format of a catalog resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFormat {
    /// ISO-9660 optical image.
    Iso,
    /// QEMU copy-on-write image.
    Qcow2,
    /// Raw disk image.
    Raw,
}

/// Location of a resource inside one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRef {
    /// Store holding the copy.
    pub store_id: Uuid,
    /// Store-specific URL of the copy.
    pub install_url: String,
}

/// Resource as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Resource identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Media format.
    pub format: MediaFormat,
    /// Size of the image.
    pub size_bytes: u64,
    /// Stores the resource is known to live in.
    #[serde(default)]
    pub store_refs: Vec<StoreRef>,
}

impl ResourceRecord {
    /// Reference for the copy held by `store_id`.
    #[must_use]
    pub fn store_ref(&self, store_id: Uuid) -> Option<&StoreRef> {
        self.store_refs.iter().find(|r| r.store_id == store_id)
    }
}

/// Address of a bus service instance owning a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Address derived from a service name and the owning resource.
    #[must_use]
    pub fn for_resource(service: &str, resource_id: Uuid) -> Self {
        Self(format!("{service}.{resource_id}"))
    }

    /// Address as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ServiceId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Copy a resource from its store onto a backend for an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachRequest {
    /// Backend receiving the copy.
    pub backend_id: Uuid,
    /// Resource being attached.
    pub resource: ResourceRecord,
    /// Store copy the backend should pull from.
    pub source: StoreRef,
    /// Instance the resource is attached for.
    pub vm_id: Uuid,
    /// Host the instance runs on.
    pub dest_host_id: Uuid,
}

/// Remove a previously attached resource from a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachRequest {
    /// Backend holding the copy.
    pub backend_id: Uuid,
    /// Resource being released.
    pub resource_id: Uuid,
    /// Instance the resource was attached for.
    pub vm_id: Uuid,
}

/// Command addressed to exactly one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendRequest {
    /// Attach a resource.
    Attach(AttachRequest),
    /// Detach a resource.
    Detach(DetachRequest),
}

impl BackendRequest {
    /// Backend the request is addressed to.
    #[must_use]
    pub const fn backend_id(&self) -> Uuid {
        match self {
            Self::Attach(request) => request.backend_id,
            Self::Detach(request) => request.backend_id,
        }
    }

    /// Resource the request concerns.
    #[must_use]
    pub const fn resource_id(&self) -> Uuid {
        match self {
            Self::Attach(request) => request.resource.id,
            Self::Detach(request) => request.resource_id,
        }
    }

    /// Instance the request is made for.
    #[must_use]
    pub const fn vm_id(&self) -> Uuid {
        match self {
            Self::Attach(request) => request.vm_id,
            Self::Detach(request) => request.vm_id,
        }
    }

    /// Machine-friendly discriminator for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Attach(_) => "attach",
            Self::Detach(_) => "detach",
        }
    }
}

/// Request paired with the bus address it is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Destination service instance.
    pub target: ServiceId,
    /// Command carried to the backend.
    pub request: BackendRequest,
}

/// Result data returned by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPayload {
    /// Where the resource landed (attach only).
    pub install_path: Option<String>,
}

/// Single reply for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendReply {
    /// Backend completed the command.
    Success(ReplyPayload),
    /// Backend rejected or could not complete the command.
    Failure(ErrorCode),
}

impl BackendReply {
    /// Successful attach reply.
    #[must_use]
    pub fn attached(install_path: impl Into<String>) -> Self {
        Self::Success(ReplyPayload {
            install_path: Some(install_path.into()),
        })
    }

    /// Successful detach reply.
    #[must_use]
    pub fn detached() -> Self {
        Self::Success(ReplyPayload::default())
    }

    /// Whether the backend reported success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Well-known error codes.
pub mod codes {
    /// Generic operation failure reported by a backend.
    pub const OPERATION_FAILED: &str = "SYS.1006";
    /// Bus task ended without producing a reply.
    pub const BUS_NO_REPLY: &str = "BUS.1001";
}

/// Structured error descriptor carried by failed replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode {
    /// Stable error code.
    pub code: String,
    /// Short human-readable description.
    pub description: String,
    /// Context specific to this occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Underlying errors, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<Self>,
}

impl ErrorCode {
    /// Descriptor with a code and description.
    #[must_use]
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            details: None,
            causes: Vec::new(),
        }
    }

    /// Generic operation failure with occurrence details.
    #[must_use]
    pub fn operation_failed(details: impl Into<String>) -> Self {
        Self::new(codes::OPERATION_FAILED, "operation failed").with_details(details)
    }

    /// Attach occurrence details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach underlying causes.
    #[must_use]
    pub fn caused_by(mut self, causes: impl IntoIterator<Item = Self>) -> Self {
        self.causes.extend(causes);
        self
    }

    /// Occurrence details, falling back to the description.
    #[must_use]
    pub fn details(&self) -> &str {
        self.details.as_deref().unwrap_or(&self.description)
    }
}

impl Display for ErrorCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.code, self.description)?;
        if let Some(details) = &self.details {
            write!(formatter, " ({details})")?;
        }
        Ok(())
    }
}

impl Error for ErrorCode {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.causes.first().map(|cause| cause as &(dyn Error + 'static))
    }
}
