//! Cluster identity and the cluster-change event plane.

pub mod events;
pub mod provider;

pub use events::{
    ClusterEvent, ClusterEventListener, ClusterTopologyChangeEvent, EventBus,
    LoggingClusterEventListener, NoopClusterEventListener, PartitionChangeEvent, SubscriptionId,
};
pub use provider::{ServiceInfoProvider, StaticServiceInfoProvider};
