//! In-memory collaborators for hook tests.
//!
//! # Panics
//!
//! The helpers here use `std::sync::Mutex` and panic if a lock is poisoned,
//! which only happens after another test thread already panicked.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use uuid::Uuid;
use vmattach_core::{
    BackendReply, BackendRequest, CatalogError, CatalogResult, Envelope, ErrorCode, MessageBus,
    ResourceCatalog, ResourceRecord,
};

use crate::fixtures;

/// Scripted behaviour for one resource.
#[derive(Debug, Clone)]
pub enum Script {
    /// Reply with success (attach replies carry a fixture install path).
    Succeed,
    /// Reply with the given failure.
    Fail(ErrorCode),
    /// Panic inside the send future.
    Panic,
}

/// Bus that answers every request according to a per-resource script.
#[derive(Debug)]
pub struct ScriptedBus {
    scripts: HashMap<Uuid, Script>,
    delays: HashMap<Uuid, Duration>,
    fallback: Script,
    sent: Mutex<Vec<Envelope>>,
}

impl Default for ScriptedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBus {
    /// Bus that succeeds for every resource.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            delays: HashMap::new(),
            fallback: Script::Succeed,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Fail requests for `resource_id` with `error`.
    #[must_use]
    pub fn fail(mut self, resource_id: Uuid, error: ErrorCode) -> Self {
        self.scripts.insert(resource_id, Script::Fail(error));
        self
    }

    /// Panic while handling requests for `resource_id`.
    #[must_use]
    pub fn panic_on(mut self, resource_id: Uuid) -> Self {
        self.scripts.insert(resource_id, Script::Panic);
        self
    }

    /// Fail every resource without its own script.
    #[must_use]
    pub fn fail_all(mut self, error: ErrorCode) -> Self {
        self.fallback = Script::Fail(error);
        self
    }

    /// Wait `delay` before replying for `resource_id`.
    #[must_use]
    pub fn delay(mut self, resource_id: Uuid, delay: Duration) -> Self {
        self.delays.insert(resource_id, delay);
        self
    }

    /// Envelopes received so far, in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if the request log lock is poisoned.
    #[must_use]
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().expect("scripted bus lock poisoned").clone()
    }

    /// Number of envelopes received so far.
    ///
    /// # Panics
    ///
    /// Panics if the request log lock is poisoned.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("scripted bus lock poisoned").len()
    }
}

#[async_trait]
impl MessageBus for ScriptedBus {
    async fn send(&self, envelope: Envelope) -> BackendReply {
        let resource_id = envelope.request.resource_id();
        let reply = match self.scripts.get(&resource_id).unwrap_or(&self.fallback) {
            Script::Succeed => success_for(&envelope.request),
            Script::Fail(error) => BackendReply::Failure(error.clone()),
            Script::Panic => panic!("scripted bus panic for {resource_id}"),
        };
        self.sent
            .lock()
            .expect("scripted bus lock poisoned")
            .push(envelope);
        if let Some(delay) = self.delays.get(&resource_id) {
            tokio::time::sleep(*delay).await;
        }
        reply
    }
}

fn success_for(request: &BackendRequest) -> BackendReply {
    match request {
        BackendRequest::Attach(attach) => {
            BackendReply::attached(fixtures::install_path(attach.backend_id, attach.resource.id))
        }
        BackendRequest::Detach(_) => BackendReply::detached(),
    }
}

/// Bus whose replies are held until the test releases them.
///
/// Gates are created up front, so a reply may be released before the request
/// arrives. Requests for resources without a gate fail immediately.
#[derive(Debug)]
pub struct GatedBus {
    senders: Mutex<HashMap<Uuid, oneshot::Sender<BackendReply>>>,
    receivers: Mutex<HashMap<Uuid, oneshot::Receiver<BackendReply>>>,
    sent: Mutex<Vec<Envelope>>,
}

impl GatedBus {
    /// Bus with one closed gate per resource.
    #[must_use]
    pub fn new(resource_ids: impl IntoIterator<Item = Uuid>) -> Self {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for resource_id in resource_ids {
            let (tx, rx) = oneshot::channel();
            senders.insert(resource_id, tx);
            receivers.insert(resource_id, rx);
        }
        Self {
            senders: Mutex::new(senders),
            receivers: Mutex::new(receivers),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Open the gate for `resource_id` with `reply`. Returns `false` when the
    /// gate was already used or never existed.
    ///
    /// # Panics
    ///
    /// Panics if the gate table lock is poisoned.
    pub fn release(&self, resource_id: Uuid, reply: BackendReply) -> bool {
        let sender = self
            .senders
            .lock()
            .expect("gated bus lock poisoned")
            .remove(&resource_id);
        sender.is_some_and(|sender| sender.send(reply).is_ok())
    }

    /// Number of envelopes received so far.
    ///
    /// # Panics
    ///
    /// Panics if the request log lock is poisoned.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("gated bus lock poisoned").len()
    }
}

#[async_trait]
impl MessageBus for GatedBus {
    async fn send(&self, envelope: Envelope) -> BackendReply {
        let resource_id = envelope.request.resource_id();
        let receiver = self
            .receivers
            .lock()
            .expect("gated bus lock poisoned")
            .remove(&resource_id);
        self.sent
            .lock()
            .expect("gated bus lock poisoned")
            .push(envelope);
        match receiver {
            Some(receiver) => receiver.await.unwrap_or_else(|_| {
                BackendReply::Failure(ErrorCode::operation_failed("gate dropped"))
            }),
            None => BackendReply::Failure(ErrorCode::operation_failed(format!(
                "no gate for resource {resource_id}"
            ))),
        }
    }
}

/// Catalog backed by a map, optionally reporting itself unavailable.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: HashMap<Uuid, ResourceRecord>,
    unavailable: bool,
    lookups: AtomicUsize,
}

impl MemoryCatalog {
    /// Catalog holding `records`.
    #[must_use]
    pub fn new(records: impl IntoIterator<Item = ResourceRecord>) -> Self {
        Self {
            records: records.into_iter().map(|record| (record.id, record)).collect(),
            unavailable: false,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Catalog whose every lookup fails.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Number of lookups served so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceCatalog for MemoryCatalog {
    async fn find_resource(&self, id: Uuid) -> CatalogResult<Option<ResourceRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(CatalogError::Unavailable {
                operation: "catalog.find_resource",
                source: Box::new(io::Error::other("catalog offline")),
            });
        }
        Ok(self.records.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmattach_core::{DetachRequest, ServiceId};

    fn detach(resource_id: Uuid) -> Envelope {
        Envelope {
            target: ServiceId::for_resource("storage.primary", fixtures::DATA_BACKEND),
            request: BackendRequest::Detach(DetachRequest {
                backend_id: fixtures::DATA_BACKEND,
                resource_id,
                vm_id: fixtures::VM_ID,
            }),
        }
    }

    #[tokio::test]
    async fn scripted_bus_follows_script_and_records() {
        let failing = fixtures::resource_id(1);
        let bus = ScriptedBus::new().fail(failing, ErrorCode::operation_failed("disk full"));

        assert!(bus.send(detach(fixtures::resource_id(0))).await.is_success());
        assert!(!bus.send(detach(failing)).await.is_success());
        assert_eq!(bus.sent_count(), 2);
        assert_eq!(bus.sent()[1].request.resource_id(), failing);
    }

    #[tokio::test]
    async fn gated_bus_holds_reply_until_released() {
        let id = fixtures::resource_id(0);
        let bus = std::sync::Arc::new(GatedBus::new([id]));
        let pending = tokio::spawn({
            let bus = bus.clone();
            async move { bus.send(detach(id)).await }
        });

        tokio::task::yield_now().await;
        assert!(!pending.is_finished());
        assert!(bus.release(id, BackendReply::detached()));
        assert!(!bus.release(id, BackendReply::detached()));
        let reply = pending.await.expect("send task");
        assert!(reply.is_success());
    }

    #[tokio::test]
    async fn gated_bus_fails_ungated_resources() {
        let bus = GatedBus::new(Vec::new());
        assert!(!bus.send(detach(fixtures::resource_id(9))).await.is_success());
    }

    #[tokio::test]
    async fn memory_catalog_counts_lookups() {
        let catalog = MemoryCatalog::new(fixtures::resources(1));
        let found = catalog
            .find_resource(fixtures::resource_id(0))
            .await
            .expect("lookup");
        assert!(found.is_some());
        let missing = catalog
            .find_resource(fixtures::resource_id(5))
            .await
            .expect("lookup");
        assert!(missing.is_none());
        assert_eq!(catalog.lookups(), 2);

        let offline = MemoryCatalog::unavailable();
        assert!(offline.find_resource(fixtures::resource_id(0)).await.is_err());
    }
}
