//! Consistent-hash partition service.
//!
//! Maps every (role, tenant, entity) triple to a partition of the role's
//! topic, and decides which live instance currently owns each partition.
//! Entity→partition resolution is pure hashing and never depends on cluster
//! membership; ownership is recomputed from scratch on every membership
//! change and compared against the previous snapshot to publish change
//! events.
//!
//! Every role × tenant combination ([`ServiceKey`]) gets its own ring, so a
//! tenant served by dedicated instances is isolated from the shared pool.

use crate::cluster::events::{
    ClusterEvent, ClusterTopologyChangeEvent, EventBus, PartitionChangeEvent,
};
use crate::cluster::provider::ServiceInfoProvider;
use crate::config::PartitionSettings;
use crate::error::{Error, Result};
use crate::hashing::{ConsistentHashCircle, HashFunction};
use crate::types::{EntityId, ServiceInfo, ServiceKey, ServiceType, TenantId, TopicPartitionInfo};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Partition resolution and ownership queries.
///
/// Read methods are safe under concurrent callers; `recalculate_partitions`
/// must be serialized by the invoker (the discovery layer).
pub trait PartitionService: Send + Sync {
    /// Resolve an entity to its topic partition. Deterministic and
    /// independent of cluster membership.
    fn resolve(
        &self,
        service_type: ServiceType,
        tenant_id: TenantId,
        entity_id: EntityId,
    ) -> Result<TopicPartitionInfo>;

    /// Recompute partition ownership from a fresh membership snapshot and
    /// publish change events for every difference observed.
    fn recalculate_partitions(&self, current: &ServiceInfo, others: &[ServiceInfo]);

    /// The partitions the local instance owns for a role, as of the last
    /// recomputation. Empty when the instance owns nothing for the role.
    fn get_current_partitions(&self, service_type: ServiceType) -> Vec<TopicPartitionInfo>;

    /// Ids of every known instance (local and peers) declaring a role.
    fn get_all_service_ids(&self, service_type: ServiceType) -> HashSet<String>;

    /// The stable per-instance notification destination for a role.
    fn get_notifications_topic(
        &self,
        service_type: ServiceType,
        service_id: &str,
    ) -> TopicPartitionInfo;
}

/// Memo key for resolved destinations: the tenant half is only present for
/// isolated tenants, so all shared-scope tenants share one entry per
/// partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TpiCacheKey {
    service_type: ServiceType,
    tenant_id: Option<TenantId>,
    partition: u32,
}

/// Consistent-hash implementation of [`PartitionService`].
pub struct ConsistentHashPartitionService {
    partition_topics: HashMap<ServiceType, String>,
    partition_sizes: HashMap<ServiceType, u32>,
    hash_function: HashFunction,
    virtual_nodes_size: u32,

    service_info_provider: Arc<dyn ServiceInfoProvider>,
    event_bus: Arc<EventBus>,

    /// Owned partitions per ServiceKey; replaced wholesale per
    /// recomputation.
    my_partitions: RwLock<HashMap<ServiceKey, Vec<u32>>>,

    /// Tenants served by dedicated instances, per role. Populated
    /// additively from peer advertisements; see
    /// [`replace_isolated_tenants`](Self::replace_isolated_tenants).
    isolated_tenants: RwLock<HashMap<TenantId, HashSet<ServiceType>>>,

    /// Memoized resolve results; cleared wholesale per recomputation.
    tpi_cache: DashMap<TpiCacheKey, TopicPartitionInfo>,

    core_notification_topics: DashMap<String, TopicPartitionInfo>,
    rule_engine_notification_topics: DashMap<String, TopicPartitionInfo>,

    /// Peer snapshot of the last recomputation; `None` before the first.
    current_other_services: RwLock<Option<Vec<ServiceInfo>>>,
}

impl ConsistentHashPartitionService {
    /// Create the service from validated settings.
    ///
    /// Fails when the configured hash function is unknown.
    pub fn new(
        settings: &PartitionSettings,
        service_info_provider: Arc<dyn ServiceInfoProvider>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        let hash_function: HashFunction = settings.hash_function_name.parse()?;

        let mut partition_topics = HashMap::new();
        partition_topics.insert(ServiceType::TbCore, settings.core_topic.clone());
        partition_topics.insert(ServiceType::TbRuleEngine, settings.rule_engine_topic.clone());

        let mut partition_sizes = HashMap::new();
        partition_sizes.insert(ServiceType::TbCore, settings.core_partitions);
        partition_sizes.insert(ServiceType::TbRuleEngine, settings.rule_engine_partitions);

        Ok(Self {
            partition_topics,
            partition_sizes,
            hash_function,
            virtual_nodes_size: settings.virtual_nodes_size,
            service_info_provider,
            event_bus,
            my_partitions: RwLock::new(HashMap::new()),
            isolated_tenants: RwLock::new(HashMap::new()),
            tpi_cache: DashMap::new(),
            core_notification_topics: DashMap::new(),
            rule_engine_notification_topics: DashMap::new(),
            current_other_services: RwLock::new(None),
        })
    }

    /// The event bus change events are published on.
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Replace the isolation table wholesale.
    ///
    /// The table is normally learned additively from peer advertisements and
    /// never pruned; this hook lets an authoritative source (e.g. a tenant
    /// profile store) take over.
    pub fn replace_isolated_tenants(&self, tenants: HashMap<TenantId, HashSet<ServiceType>>) {
        *self.isolated_tenants.write() = tenants;
        self.tpi_cache.clear();
    }

    /// Roles for which a tenant is currently isolated.
    pub fn isolated_roles(&self, tenant_id: TenantId) -> HashSet<ServiceType> {
        self.isolated_tenants
            .read()
            .get(&tenant_id)
            .cloned()
            .unwrap_or_default()
    }

    fn is_isolated(&self, service_type: ServiceType, tenant_id: TenantId) -> bool {
        self.isolated_tenants
            .read()
            .get(&tenant_id)
            .is_some_and(|roles| roles.contains(&service_type))
    }

    fn partition_count(&self, service_type: ServiceType) -> Result<u32> {
        self.partition_sizes
            .get(&service_type)
            .copied()
            .ok_or_else(|| {
                Error::Config(format!("no partitions configured for role {service_type}"))
            })
    }

    fn build_tpi(
        &self,
        service_type: ServiceType,
        tenant_id: TenantId,
        partition: u32,
    ) -> Result<TopicPartitionInfo> {
        let topic = self.partition_topics.get(&service_type).ok_or_else(|| {
            Error::Config(format!("no topic configured for role {service_type}"))
        })?;

        let mut tpi = TopicPartitionInfo::new(topic.clone(), partition);
        let search_key = if self.is_isolated(service_type, tenant_id) {
            tpi = tpi.with_tenant(tenant_id);
            ServiceKey::new(service_type, tenant_id)
        } else {
            ServiceKey::system(service_type)
        };
        let owned = self
            .my_partitions
            .read()
            .get(&search_key)
            .is_some_and(|partitions| partitions.contains(&partition));
        Ok(tpi.with_my_partition(owned))
    }

    fn build_notifications_tpi(service_type: ServiceType, service_id: &str) -> TopicPartitionInfo {
        TopicPartitionInfo::notifications(format!(
            "{}.notifications.{}",
            service_type.name().to_lowercase(),
            service_id
        ))
    }

    /// Place an instance's virtual nodes on the rings of every role it
    /// declares. Unknown roles are logged and skipped; the instance stays
    /// valid for its remaining roles.
    fn add_node(
        &self,
        circles: &mut HashMap<ServiceKey, ConsistentHashCircle<ServiceInfo>>,
        instance: &ServiceInfo,
    ) {
        let tenant_id = instance.tenant_id();
        for name in &instance.service_types {
            let service_type = match ServiceType::from_name(name) {
                Ok(service_type) => service_type,
                Err(_) => {
                    tracing::warn!(
                        service_id = %instance.service_id,
                        role = %name,
                        "Skipping unknown role in peer advertisement"
                    );
                    continue;
                }
            };
            let key = ServiceKey::new(service_type, tenant_id);
            let circle = circles.entry(key).or_default();
            for i in 0..self.virtual_nodes_size {
                let position = self
                    .hash_function
                    .hasher()
                    .put_str(&instance.service_id)
                    .put_i32(i as i32)
                    .finish()
                    .as_i64();
                circle.insert(position, instance.clone());
            }
        }
    }

    fn resolve_by_partition_idx<'a>(
        &self,
        circle: &'a ConsistentHashCircle<ServiceInfo>,
        partition_idx: u32,
    ) -> Option<&'a ServiceInfo> {
        let position = self
            .hash_function
            .hasher()
            .put_i32(partition_idx as i32)
            .finish()
            .as_i64();
        circle.resolve(position)
    }

    fn log_service_info(instance: &ServiceInfo) {
        let tenant_id = instance.tenant_id();
        if tenant_id.is_system() {
            tracing::info!(
                service_id = %instance.service_id,
                roles = ?instance.service_types,
                "Found common server"
            );
        } else {
            tracing::info!(
                service_id = %instance.service_id,
                tenant_id = %tenant_id,
                roles = ?instance.service_types,
                "Found tenant-dedicated server"
            );
        }
    }

    fn group_by_service_key(services: &[ServiceInfo]) -> HashMap<ServiceKey, Vec<ServiceInfo>> {
        let mut map: HashMap<ServiceKey, Vec<ServiceInfo>> = HashMap::new();
        for info in services {
            let tenant_id = info.tenant_id();
            for name in &info.service_types {
                // Unknown roles were already logged while building rings.
                let Ok(service_type) = ServiceType::from_name(name) else {
                    continue;
                };
                map.entry(ServiceKey::new(service_type, tenant_id))
                    .or_default()
                    .push(info.clone());
            }
        }
        map
    }
}

impl PartitionService for ConsistentHashPartitionService {
    fn resolve(
        &self,
        service_type: ServiceType,
        tenant_id: TenantId,
        entity_id: EntityId,
    ) -> Result<TopicPartitionInfo> {
        let size = self.partition_count(service_type)?;
        let (msb, lsb) = entity_id.as_halves();
        let hash = self
            .hash_function
            .hasher()
            .put_i64(msb as i64)
            .put_i64(lsb as i64)
            .finish()
            .as_i32();
        // Wide arithmetic keeps |i32::MIN| representable.
        let partition = ((hash as i64) % (size as i64)).unsigned_abs() as u32;

        let isolated = self.is_isolated(service_type, tenant_id);
        let cache_key = TpiCacheKey {
            service_type,
            tenant_id: isolated.then_some(tenant_id),
            partition,
        };
        if let Some(tpi) = self.tpi_cache.get(&cache_key) {
            return Ok(tpi.value().clone());
        }
        let tpi = self.build_tpi(service_type, tenant_id, partition)?;
        self.tpi_cache.insert(cache_key, tpi.clone());
        Ok(tpi)
    }

    fn recalculate_partitions(&self, current: &ServiceInfo, others: &[ServiceInfo]) {
        Self::log_service_info(current);
        for other in others {
            Self::log_service_info(other);
        }

        let mut circles: HashMap<ServiceKey, ConsistentHashCircle<ServiceInfo>> = HashMap::new();
        self.add_node(&mut circles, current);
        {
            let mut isolated = self.isolated_tenants.write();
            for other in others {
                self.add_node(&mut circles, other);
                let tenant_id = other.tenant_id();
                if !tenant_id.is_system() {
                    let roles = isolated.entry(tenant_id).or_default();
                    for name in &other.service_types {
                        if let Ok(service_type) = ServiceType::from_name(name) {
                            roles.insert(service_type);
                        }
                    }
                }
            }
        }

        let my_tenant = current.tenant_id();
        let mut new_partitions: HashMap<ServiceKey, Vec<u32>> = HashMap::new();
        for (&service_type, &size) in &self.partition_sizes {
            let my_key = ServiceKey::new(service_type, my_tenant);
            let Some(circle) = circles.get(&my_key) else {
                continue;
            };
            for idx in 0..size {
                let Some(owner) = self.resolve_by_partition_idx(circle, idx) else {
                    continue;
                };
                if owner == current {
                    let owner_key = ServiceKey::new(service_type, owner.tenant_id());
                    new_partitions.entry(owner_key).or_default().push(idx);
                }
            }
        }

        // Install the new snapshot before building event TPIs so their
        // ownership flags reflect the new assignment.
        let old_partitions =
            std::mem::replace(&mut *self.my_partitions.write(), new_partitions.clone());

        let mut changed: Vec<(ServiceKey, Vec<u32>)> = Vec::new();
        for (key, partitions) in &new_partitions {
            if old_partitions.get(key) != Some(partitions) {
                changed.push((*key, partitions.clone()));
            }
        }
        for key in old_partitions.keys() {
            if !new_partitions.contains_key(key) {
                changed.push((*key, Vec::new()));
            }
        }
        changed.sort_by_key(|(key, _)| *key);

        for (key, partitions) in changed {
            tracing::info!(service_key = %key, ?partitions, "New partition assignment");
            let tpis: Vec<TopicPartitionInfo> = partitions
                .iter()
                .filter_map(|&partition| {
                    self.build_tpi(key.service_type, key.tenant_id, partition).ok()
                })
                .collect();
            self.event_bus
                .publish(&ClusterEvent::PartitionChange(PartitionChangeEvent {
                    service_key: key,
                    partitions: tpis,
                }));
        }

        self.tpi_cache.clear();

        let topology_changes = {
            let mut current_others = self.current_other_services.write();
            match current_others.replace(others.to_vec()) {
                None => None,
                Some(previous) => {
                    let old_map = Self::group_by_service_key(&previous);
                    let new_map = Self::group_by_service_key(others);
                    let mut changes: HashSet<ServiceKey> = HashSet::new();
                    for (key, list) in &old_map {
                        if new_map.get(key) != Some(list) {
                            changes.insert(*key);
                        }
                    }
                    for key in new_map.keys() {
                        if !old_map.contains_key(key) {
                            changes.insert(*key);
                        }
                    }
                    (!changes.is_empty()).then_some(changes)
                }
            }
        };
        if let Some(service_keys) = topology_changes {
            self.event_bus
                .publish(&ClusterEvent::TopologyChange(ClusterTopologyChangeEvent {
                    service_keys,
                }));
        }
    }

    fn get_current_partitions(&self, service_type: ServiceType) -> Vec<TopicPartitionInfo> {
        let Some(topic) = self.partition_topics.get(&service_type) else {
            return Vec::new();
        };
        let current = self.service_info_provider.service_info();
        let tenant_id = current.tenant_id();
        let key = ServiceKey::new(service_type, tenant_id);
        let partitions = self
            .my_partitions
            .read()
            .get(&key)
            .cloned()
            .unwrap_or_default();
        partitions
            .into_iter()
            .map(|partition| {
                let mut tpi =
                    TopicPartitionInfo::new(topic.clone(), partition).with_my_partition(true);
                if !tenant_id.is_system() {
                    tpi = tpi.with_tenant(tenant_id);
                }
                tpi
            })
            .collect()
    }

    fn get_all_service_ids(&self, service_type: ServiceType) -> HashSet<String> {
        let mut result = HashSet::new();
        let current = self.service_info_provider.service_info();
        if current.declares(service_type) {
            result.insert(current.service_id);
        }
        if let Some(others) = self.current_other_services.read().as_ref() {
            for info in others {
                if info.declares(service_type) {
                    result.insert(info.service_id.clone());
                }
            }
        }
        result
    }

    fn get_notifications_topic(
        &self,
        service_type: ServiceType,
        service_id: &str,
    ) -> TopicPartitionInfo {
        match service_type {
            ServiceType::TbCore => self
                .core_notification_topics
                .entry(service_id.to_owned())
                .or_insert_with(|| Self::build_notifications_tpi(service_type, service_id))
                .value()
                .clone(),
            ServiceType::TbRuleEngine => self
                .rule_engine_notification_topics
                .entry(service_id.to_owned())
                .or_insert_with(|| Self::build_notifications_tpi(service_type, service_id))
                .value()
                .clone(),
            _ => Self::build_notifications_tpi(service_type, service_id),
        }
    }
}

impl fmt::Debug for ConsistentHashPartitionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsistentHashPartitionService")
            .field("hash_function", &self.hash_function)
            .field("virtual_nodes_size", &self.virtual_nodes_size)
            .field("partition_sizes", &self.partition_sizes)
            .finish()
    }
}
