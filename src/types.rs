//! Core types used throughout the routing fabric.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Tenant identifier. The nil UUID denotes the shared "system" scope; any
/// other value marks a tenant that may be served by dedicated instances.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TenantId(Uuid);

impl TenantId {
    /// The shared scope shared by all non-isolated tenants.
    pub const SYSTEM: TenantId = TenantId(Uuid::nil());

    /// Create a tenant id from a UUID.
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Reassemble a tenant id from its two 64-bit halves, most significant
    /// first. Both halves zero yields the system scope.
    pub fn from_halves(msb: u64, lsb: u64) -> Self {
        Self(Uuid::from_u64_pair(msb, lsb))
    }

    /// Whether this is the shared system scope.
    pub fn is_system(&self) -> bool {
        self.0.is_nil()
    }

    /// The underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an entity whose messages are routed through the fabric
/// (device, asset, dashboard, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Create an entity id from a UUID.
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// The two 64-bit halves of the UUID, most significant first.
    /// This is the exact input order fed to the partition hash.
    pub fn as_halves(&self) -> (u64, u64) {
        self.0.as_u64_pair()
    }

    /// The underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roles a service instance can declare.
///
/// Only [`TbCore`](ServiceType::TbCore) and
/// [`TbRuleEngine`](ServiceType::TbRuleEngine) participate in partition
/// ownership; the remaining roles still join rings and isolation tracking
/// but have no partitioned topics of their own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ServiceType {
    /// Core message processing.
    TbCore,
    /// Rule-engine message processing.
    TbRuleEngine,
    /// Device transport front-end.
    TbTransport,
    /// Script execution sandbox.
    JsExecutor,
}

impl ServiceType {
    /// The wire name of the role, as it appears in peer advertisements.
    pub fn name(&self) -> &'static str {
        match self {
            ServiceType::TbCore => "TB_CORE",
            ServiceType::TbRuleEngine => "TB_RULE_ENGINE",
            ServiceType::TbTransport => "TB_TRANSPORT",
            ServiceType::JsExecutor => "JS_EXECUTOR",
        }
    }

    /// Parse a wire name, case-insensitively.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "TB_CORE" => Ok(ServiceType::TbCore),
            "TB_RULE_ENGINE" => Ok(ServiceType::TbRuleEngine),
            "TB_TRANSPORT" => Ok(ServiceType::TbTransport),
            "JS_EXECUTOR" => Ok(ServiceType::JsExecutor),
            _ => Err(Error::UnknownServiceType(name.to_string())),
        }
    }

    /// Whether the role owns partitioned topics.
    pub fn is_partitioned(&self) -> bool {
        matches!(self, ServiceType::TbCore | ServiceType::TbRuleEngine)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServiceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Unit of partition assignment: every role × tenant combination has its own
/// independent ring and partition list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ServiceKey {
    pub service_type: ServiceType,
    pub tenant_id: TenantId,
}

impl ServiceKey {
    /// Create a service key.
    pub fn new(service_type: ServiceType, tenant_id: TenantId) -> Self {
        Self {
            service_type,
            tenant_id,
        }
    }

    /// The shared-scope key for a role.
    pub fn system(service_type: ServiceType) -> Self {
        Self::new(service_type, TenantId::SYSTEM)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.service_type, self.tenant_id)
    }
}

/// Advertisement of a live service instance, as supplied by the discovery
/// collaborator.
///
/// `service_types` carries raw wire names so that an instance advertising a
/// role this build does not know stays usable for its remaining roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Unique instance identifier.
    pub service_id: String,
    /// Declared roles, by wire name.
    pub service_types: Vec<String>,
    /// Most significant half of the dedicated tenant id; zero for shared.
    pub tenant_id_msb: u64,
    /// Least significant half of the dedicated tenant id; zero for shared.
    pub tenant_id_lsb: u64,
}

impl ServiceInfo {
    /// Create an advertisement for a shared (system-scope) instance.
    pub fn new(service_id: impl Into<String>, service_types: &[ServiceType]) -> Self {
        Self {
            service_id: service_id.into(),
            service_types: service_types.iter().map(|t| t.name().to_string()).collect(),
            tenant_id_msb: 0,
            tenant_id_lsb: 0,
        }
    }

    /// Mark the instance as dedicated to a single tenant.
    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        let (msb, lsb) = tenant_id.uuid().as_u64_pair();
        self.tenant_id_msb = msb;
        self.tenant_id_lsb = lsb;
        self
    }

    /// The tenant this instance is dedicated to, or the system scope.
    pub fn tenant_id(&self) -> TenantId {
        TenantId::from_halves(self.tenant_id_msb, self.tenant_id_lsb)
    }

    /// Whether the instance declares the given role.
    pub fn declares(&self, service_type: ServiceType) -> bool {
        self.service_types
            .iter()
            .any(|s| s.eq_ignore_ascii_case(service_type.name()))
    }
}

/// Immutable addressing value for a resolved destination.
///
/// `my_partition` reflects ownership at construction time; consumers learn
/// about later rebalances through partition-change events and rebuild their
/// subscriptions, so staleness of the flag is tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicPartitionInfo {
    /// Logical topic name.
    pub topic: String,
    /// Partition index; absent for notification topics.
    pub partition: Option<u32>,
    /// Present only when the destination is an isolated tenant's partition.
    pub tenant_id: Option<TenantId>,
    /// Whether the local instance owned this partition when the value was
    /// built.
    pub my_partition: bool,
}

impl TopicPartitionInfo {
    /// Create a partitioned destination.
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition: Some(partition),
            tenant_id: None,
            my_partition: false,
        }
    }

    /// Create an unpartitioned notification destination.
    pub fn notifications(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            tenant_id: None,
            my_partition: false,
        }
    }

    /// Attach the isolated tenant.
    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Set the local-ownership flag.
    pub fn with_my_partition(mut self, my_partition: bool) -> Self {
        self.my_partition = my_partition;
        self
    }

    /// Fully qualified topic name, including the tenant and partition
    /// suffixes where present. This is the name physical queues go by.
    pub fn full_topic_name(&self) -> String {
        let mut name = self.topic.clone();
        if let Some(tenant_id) = &self.tenant_id {
            name.push('.');
            name.push_str(&tenant_id.to_string());
        }
        if let Some(partition) = self.partition {
            name.push('.');
            name.push_str(&partition.to_string());
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_halves_round_trip() {
        let tenant = TenantId::new(Uuid::new_v4());
        let (msb, lsb) = tenant.uuid().as_u64_pair();
        assert_eq!(TenantId::from_halves(msb, lsb), tenant);
        assert_eq!(TenantId::from_halves(0, 0), TenantId::SYSTEM);
        assert!(TenantId::SYSTEM.is_system());
    }

    #[test]
    fn test_service_type_names() {
        assert_eq!(ServiceType::TbCore.name(), "TB_CORE");
        assert_eq!(
            ServiceType::from_name("tb_rule_engine").unwrap(),
            ServiceType::TbRuleEngine
        );
        assert!(ServiceType::from_name("TB_WEB").is_err());
        assert!(ServiceType::TbCore.is_partitioned());
        assert!(!ServiceType::TbTransport.is_partitioned());
    }

    #[test]
    fn test_service_key_equality() {
        let t1 = TenantId::new(Uuid::new_v4());
        let a = ServiceKey::new(ServiceType::TbCore, t1);
        let b = ServiceKey::new(ServiceType::TbCore, t1);
        let c = ServiceKey::system(ServiceType::TbCore);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(
            ServiceKey::system(ServiceType::TbCore),
            ServiceKey::system(ServiceType::TbRuleEngine)
        );
    }

    #[test]
    fn test_service_info_declares() {
        let info = ServiceInfo::new("core-1", &[ServiceType::TbCore, ServiceType::TbRuleEngine]);
        assert!(info.declares(ServiceType::TbCore));
        assert!(info.declares(ServiceType::TbRuleEngine));
        assert!(!info.declares(ServiceType::TbTransport));
        assert!(info.tenant_id().is_system());

        let tenant = TenantId::new(Uuid::new_v4());
        let dedicated = ServiceInfo::new("core-2", &[ServiceType::TbCore]).with_tenant(tenant);
        assert_eq!(dedicated.tenant_id(), tenant);
    }

    #[test]
    fn test_service_info_serialization() {
        let info = ServiceInfo::new("core-1", &[ServiceType::TbCore]);
        let bytes = bincode::serialize(&info).unwrap();
        let decoded: ServiceInfo = bincode::deserialize(&bytes).unwrap();
        assert_eq!(info, decoded);
    }

    #[test]
    fn test_full_topic_name() {
        let tpi = TopicPartitionInfo::new("tb_core", 7);
        assert_eq!(tpi.full_topic_name(), "tb_core.7");

        let tenant = TenantId::new(Uuid::new_v4());
        let isolated = TopicPartitionInfo::new("tb_core", 7).with_tenant(tenant);
        assert_eq!(
            isolated.full_topic_name(),
            format!("tb_core.{}.7", tenant)
        );

        let notifications = TopicPartitionInfo::notifications("tb_core.notifications.core-1");
        assert_eq!(notifications.full_topic_name(), "tb_core.notifications.core-1");
        assert_eq!(notifications.partition, None);
    }
}
