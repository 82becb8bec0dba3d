//! Partition assignment and routing fabric for clustered IoT message
//! processing.
//!
//! Stateless service instances of two logical roles (core and rule engine)
//! cooperate on a stream of tenant-scoped messages keyed by entity UUIDs.
//! This crate decides where every message goes and who is responsible for
//! it:
//!
//! - **Partition service** — deterministically resolves an entity to a
//!   partition of the role's topic and, from the current membership
//!   snapshot, decides which live instance owns each partition. One
//!   consistent-hash ring per role × tenant gives dedicated tenants full
//!   isolation from the shared pool.
//! - **Queue fabric** — topic-scoped in-memory MPMC queues behind
//!   producer/consumer traits, and a request/response template with bounded
//!   pending tracking and per-call timeouts.
//! - **Event plane** — partition-change and topology-change events fanned
//!   out synchronously to in-process subscribers whenever recomputation
//!   observes a difference.
//!
//! # Example
//!
//! ```rust,no_run
//! use fabriq::{
//!     ConsistentHashPartitionService, EntityId, EventBus, PartitionService,
//!     PartitionSettings, ServiceInfo, ServiceType, StaticServiceInfoProvider, TenantId,
//! };
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! fn main() -> fabriq::Result<()> {
//!     let settings = PartitionSettings::default();
//!     let local = ServiceInfo::new("core-1", &[ServiceType::TbCore]);
//!     let service = ConsistentHashPartitionService::new(
//!         &settings,
//!         Arc::new(StaticServiceInfoProvider::new(local.clone())),
//!         Arc::new(EventBus::new()),
//!     )?;
//!
//!     // The discovery layer feeds every membership change in.
//!     service.recalculate_partitions(&local, &[]);
//!
//!     let tpi = service.resolve(
//!         ServiceType::TbCore,
//!         TenantId::SYSTEM,
//!         EntityId::new(Uuid::new_v4()),
//!     )?;
//!     println!("route to {} (ours: {})", tpi.full_topic_name(), tpi.my_partition);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Message processors              │
//! └──────────────────────────────────────────────┘
//!          │ resolve / getCurrentPartitions
//!          ▼
//! ┌──────────────────────────────────────────────┐
//! │        ConsistentHashPartitionService        │
//! │  rings per (role, tenant) · TPI cache        │
//! └──────────────────────────────────────────────┘
//!      │ change events              │ TPIs
//!      ▼                            ▼
//! ┌──────────┐            ┌──────────────────────┐
//! │ EventBus │            │  In-memory queues    │
//! │          │            │  producer/consumer   │
//! └──────────┘            │  request template    │
//!                         └──────────────────────┘
//! ```
//!
//! # Consistency model
//!
//! Ownership is eventually consistent: peers recompute independently from
//! the same membership snapshot and arrive at the same assignment without
//! coordinating. The fabric does not provide exactly-once delivery, durable
//! replay, or cross-process ordering.

pub mod cluster;
pub mod config;
pub mod error;
pub mod hashing;
pub mod partition;
pub mod queue;
pub mod testing;
pub mod types;

// Re-export main types for convenience
pub use config::{PartitionSettings, TransportApiSettings};
pub use error::{Error, Result};
pub use types::{
    EntityId, ServiceInfo, ServiceKey, ServiceType, TenantId, TopicPartitionInfo,
};

// Re-export cluster types
pub use cluster::{
    ClusterEvent, ClusterEventListener, ClusterTopologyChangeEvent, EventBus,
    LoggingClusterEventListener, NoopClusterEventListener, PartitionChangeEvent,
    ServiceInfoProvider, StaticServiceInfoProvider, SubscriptionId,
};

// Re-export hashing types
pub use hashing::{ConsistentHashCircle, HashCode, HashFunction, Hasher};

// Re-export partitioning types
pub use partition::{ConsistentHashPartitionService, PartitionService};

// Re-export queue types
pub use queue::{
    InMemoryConsumer, InMemoryProducer, InMemoryQueueProvider, InMemoryQueueRegistry,
    MsgPackCallback, MsgPackContext, QueueCallback, QueueConsumer, QueueMsg, QueueProducer,
    RequestTemplate, ResponseFuture,
};
