//! Shared helpers for fabric tests.

use crate::cluster::events::{ClusterEvent, ClusterEventListener, EventBus};
use crate::cluster::provider::StaticServiceInfoProvider;
use crate::config::PartitionSettings;
use crate::partition::service::ConsistentHashPartitionService;
use crate::types::{ServiceInfo, ServiceType, TenantId};
use parking_lot::Mutex;
use std::sync::Arc;

/// Event listener that records everything it receives, in delivery order.
#[derive(Default)]
pub struct RecordingEventListener {
    events: Mutex<Vec<ClusterEvent>>,
}

impl RecordingEventListener {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<ClusterEvent> {
        self.events.lock().clone()
    }

    /// Recorded partition-change events only.
    pub fn partition_changes(&self) -> Vec<crate::cluster::events::PartitionChangeEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ClusterEvent::PartitionChange(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded topology-change events only.
    pub fn topology_changes(&self) -> Vec<crate::cluster::events::ClusterTopologyChangeEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ClusterEvent::TopologyChange(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ClusterEventListener for RecordingEventListener {
    fn on_event(&self, event: &ClusterEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Advertisement for a shared-scope instance.
pub fn service_info(service_id: &str, service_types: &[ServiceType]) -> ServiceInfo {
    ServiceInfo::new(service_id, service_types)
}

/// Advertisement for a tenant-dedicated instance.
pub fn isolated_service_info(
    service_id: &str,
    service_types: &[ServiceType],
    tenant_id: TenantId,
) -> ServiceInfo {
    ServiceInfo::new(service_id, service_types).with_tenant(tenant_id)
}

/// Partition service for a local identity, with a fresh bus and a recorder
/// already subscribed.
pub fn partition_service_for(
    info: &ServiceInfo,
    settings: &PartitionSettings,
) -> (
    Arc<ConsistentHashPartitionService>,
    Arc<RecordingEventListener>,
) {
    let bus = Arc::new(EventBus::new());
    let recorder = Arc::new(RecordingEventListener::new());
    bus.subscribe(recorder.clone());
    let service = ConsistentHashPartitionService::new(
        settings,
        Arc::new(StaticServiceInfoProvider::new(info.clone())),
        bus,
    )
    .expect("settings must be valid");
    (Arc::new(service), recorder)
}
