//! Partition assignment: entity→partition resolution and ownership
//! recomputation.
//!
//! # Architecture
//!
//! ```text
//! resolve(role, tenant, entity)
//!        │ hash(entity) % partitions[role]
//!        ▼
//! ┌──────────────────────────────┐    recalculate_partitions(current, peers)
//! │ ConsistentHashPartitionService│◄── one ring per (role, tenant)
//! │  tpi cache │ my_partitions   │    virtual_nodes_size positions/instance
//! └──────────────────────────────┘
//!        │ on difference vs previous snapshot
//!        ▼
//!   EventBus: PartitionChangeEvent*, ClusterTopologyChangeEvent?
//! ```
//!
//! Peers that recompute from the same membership snapshot derive identical
//! ownership without coordinating: the rings, hash inputs, and virtual-node
//! counts are deterministic functions of configuration and the snapshot.

pub mod service;

pub use service::{ConsistentHashPartitionService, PartitionService};
