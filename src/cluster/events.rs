//! Cluster-change events and the in-process event plane.
//!
//! The partition service publishes two event kinds while recomputing
//! assignments: one [`PartitionChangeEvent`] per ServiceKey whose owned
//! partition list changed, then at most one batched
//! [`ClusterTopologyChangeEvent`]. Delivery is synchronous with the
//! recomputation and fans out to subscribers in registration order.
//!
//! Handlers must not re-enter the partition service; recomputation state is
//! mid-swap while they run.

use crate::types::{ServiceKey, TopicPartitionInfo};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The owned partition list of a ServiceKey changed.
///
/// `partitions` is the full new list; it is empty when the local instance
/// lost the key entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionChangeEvent {
    /// The role × tenant combination whose assignment changed.
    pub service_key: ServiceKey,
    /// The complete new set of owned partitions.
    pub partitions: Vec<TopicPartitionInfo>,
}

/// The set of live instances changed for one or more ServiceKeys.
/// At most one of these is published per recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopologyChangeEvent {
    /// Every ServiceKey whose instance list changed.
    pub service_keys: HashSet<ServiceKey>,
}

/// Events published by the partition service.
#[derive(Debug, Clone)]
pub enum ClusterEvent {
    /// Owned partitions changed for a ServiceKey.
    PartitionChange(PartitionChangeEvent),
    /// Peer membership changed for a set of ServiceKeys.
    TopologyChange(ClusterTopologyChangeEvent),
}

impl ClusterEvent {
    /// Check if this is a partition-change event.
    pub fn is_partition_change(&self) -> bool {
        matches!(self, ClusterEvent::PartitionChange(_))
    }

    /// Check if this is a topology-change event.
    pub fn is_topology_change(&self) -> bool {
        matches!(self, ClusterEvent::TopologyChange(_))
    }
}

/// Listener for cluster-change events.
pub trait ClusterEventListener: Send + Sync + 'static {
    /// Called synchronously for every published event.
    fn on_event(&self, event: &ClusterEvent);
}

/// No-op event listener.
pub struct NoopClusterEventListener;

impl ClusterEventListener for NoopClusterEventListener {
    fn on_event(&self, _event: &ClusterEvent) {}
}

/// Event listener that logs events.
pub struct LoggingClusterEventListener;

impl ClusterEventListener for LoggingClusterEventListener {
    fn on_event(&self, event: &ClusterEvent) {
        match event {
            ClusterEvent::PartitionChange(e) => {
                tracing::info!(
                    service_key = %e.service_key,
                    partition_count = e.partitions.len(),
                    "Partition assignment changed"
                );
            }
            ClusterEvent::TopologyChange(e) => {
                tracing::info!(
                    changed_keys = e.service_keys.len(),
                    "Cluster topology changed"
                );
            }
        }
    }
}

/// Handle for removing a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// In-process fan-out of cluster-change events.
///
/// Subscribers are invoked in registration order. A panicking subscriber is
/// logged and does not prevent delivery to the remaining subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<(SubscriptionId, Arc<dyn ClusterEventListener>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; returns the handle for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(&self, listener: Arc<dyn ClusterEventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, listener));
        id
    }

    /// Remove a listener. Returns false when the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver an event to every subscriber, in registration order.
    pub fn publish(&self, event: &ClusterEvent) {
        let listeners: Vec<Arc<dyn ClusterEventListener>> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
                tracing::warn!("Event subscriber panicked; continuing with remaining subscribers");
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
