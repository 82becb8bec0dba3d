//! Configuration types for the routing fabric.

use crate::error::{Error, Result};
use crate::hashing::HashFunction;
use std::env;
use std::time::Duration;

/// Settings for the partition service.
///
/// Read once at startup; the partition layout must be identical on every
/// peer or ownership will diverge.
#[derive(Debug, Clone)]
pub struct PartitionSettings {
    /// Topic name for the core role.
    pub core_topic: String,

    /// Partition count for the core role.
    pub core_partitions: u32,

    /// Topic name for the rule-engine role.
    pub rule_engine_topic: String,

    /// Partition count for the rule-engine role.
    pub rule_engine_partitions: u32,

    /// Name of the hash family used for entity resolution and ring
    /// placement. Unknown names fail at startup.
    pub hash_function_name: String,

    /// Ring positions per instance per ring.
    pub virtual_nodes_size: u32,
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self {
            core_topic: "tb_core".to_string(),
            core_partitions: 100,
            rule_engine_topic: "tb_rule_engine".to_string(),
            rule_engine_partitions: 100,
            hash_function_name: "murmur3_128".to_string(),
            virtual_nodes_size: 16,
        }
    }
}

impl PartitionSettings {
    /// Create settings with the default layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from the environment, falling back to defaults.
    ///
    /// Recognized variables: `QUEUE_CORE_TOPIC`, `QUEUE_CORE_PARTITIONS`,
    /// `QUEUE_RULE_ENGINE_TOPIC`, `QUEUE_RULE_ENGINE_PARTITIONS`,
    /// `QUEUE_PARTITIONS_HASH_FUNCTION_NAME`,
    /// `QUEUE_PARTITIONS_VIRTUAL_NODES_SIZE`.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        if let Ok(topic) = env::var("QUEUE_CORE_TOPIC") {
            settings.core_topic = topic;
        }
        if let Ok(partitions) = env::var("QUEUE_CORE_PARTITIONS") {
            settings.core_partitions = parse_env("QUEUE_CORE_PARTITIONS", &partitions)?;
        }
        if let Ok(topic) = env::var("QUEUE_RULE_ENGINE_TOPIC") {
            settings.rule_engine_topic = topic;
        }
        if let Ok(partitions) = env::var("QUEUE_RULE_ENGINE_PARTITIONS") {
            settings.rule_engine_partitions =
                parse_env("QUEUE_RULE_ENGINE_PARTITIONS", &partitions)?;
        }
        if let Ok(name) = env::var("QUEUE_PARTITIONS_HASH_FUNCTION_NAME") {
            settings.hash_function_name = name;
        }
        if let Ok(size) = env::var("QUEUE_PARTITIONS_VIRTUAL_NODES_SIZE") {
            settings.virtual_nodes_size =
                parse_env("QUEUE_PARTITIONS_VIRTUAL_NODES_SIZE", &size)?;
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Set the core topic.
    pub fn with_core_topic(mut self, topic: impl Into<String>) -> Self {
        self.core_topic = topic.into();
        self
    }

    /// Set the core partition count.
    pub fn with_core_partitions(mut self, partitions: u32) -> Self {
        self.core_partitions = partitions;
        self
    }

    /// Set the rule-engine topic.
    pub fn with_rule_engine_topic(mut self, topic: impl Into<String>) -> Self {
        self.rule_engine_topic = topic.into();
        self
    }

    /// Set the rule-engine partition count.
    pub fn with_rule_engine_partitions(mut self, partitions: u32) -> Self {
        self.rule_engine_partitions = partitions;
        self
    }

    /// Select the hash family by name.
    pub fn with_hash_function_name(mut self, name: impl Into<String>) -> Self {
        self.hash_function_name = name.into();
        self
    }

    /// Set the virtual-node count.
    pub fn with_virtual_nodes_size(mut self, size: u32) -> Self {
        self.virtual_nodes_size = size;
        self
    }

    /// Validate the settings, failing on an unknown hash function, empty
    /// topics, or zero counts.
    pub fn validate(&self) -> Result<()> {
        self.hash_function_name.parse::<HashFunction>()?;
        if self.core_topic.is_empty() || self.rule_engine_topic.is_empty() {
            return Err(Error::Config("partition topics must not be empty".into()));
        }
        if self.core_partitions == 0 || self.rule_engine_partitions == 0 {
            return Err(Error::Config("partition counts must be at least 1".into()));
        }
        if self.virtual_nodes_size == 0 {
            return Err(Error::Config("virtual_nodes_size must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_env(key: &str, value: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key}: invalid integer {value:?}")))
}

/// Settings for the transport-API request/response template.
#[derive(Debug, Clone)]
pub struct TransportApiSettings {
    /// Topic requests are published to.
    pub requests_topic: String,

    /// Topic responses are read from.
    pub responses_topic: String,

    /// Maximum number of requests awaiting a response. Further sends fail
    /// immediately for backpressure.
    pub max_pending_requests: usize,

    /// Per-request deadline.
    pub max_requests_timeout: Duration,

    /// Interval of the response poll and the expiry sweep.
    pub response_poll_interval: Duration,
}

impl Default for TransportApiSettings {
    fn default() -> Self {
        Self {
            requests_topic: "tb_transport.api.requests".to_string(),
            responses_topic: "tb_transport.api.responses".to_string(),
            max_pending_requests: 10_000,
            max_requests_timeout: Duration::from_secs(10),
            response_poll_interval: Duration::from_millis(25),
        }
    }
}

impl TransportApiSettings {
    /// Create settings with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requests topic.
    pub fn with_requests_topic(mut self, topic: impl Into<String>) -> Self {
        self.requests_topic = topic.into();
        self
    }

    /// Set the responses topic.
    pub fn with_responses_topic(mut self, topic: impl Into<String>) -> Self {
        self.responses_topic = topic.into();
        self
    }

    /// Set the pending-request bound.
    pub fn with_max_pending_requests(mut self, max: usize) -> Self {
        self.max_pending_requests = max;
        self
    }

    /// Set the per-request deadline.
    pub fn with_max_requests_timeout(mut self, timeout: Duration) -> Self {
        self.max_requests_timeout = timeout;
        self
    }

    /// Set the poll/sweep interval.
    pub fn with_response_poll_interval(mut self, interval: Duration) -> Self {
        self.response_poll_interval = interval;
        self
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        if self.requests_topic.is_empty() || self.responses_topic.is_empty() {
            return Err(Error::Config("transport-api topics must not be empty".into()));
        }
        if self.max_pending_requests == 0 {
            return Err(Error::Config("max_pending_requests must be at least 1".into()));
        }
        if self.response_poll_interval.is_zero() {
            return Err(Error::Config("response_poll_interval must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_partition_settings() {
        let settings = PartitionSettings::default();
        assert_eq!(settings.core_partitions, 100);
        assert_eq!(settings.rule_engine_partitions, 100);
        assert_eq!(settings.hash_function_name, "murmur3_128");
        assert_eq!(settings.virtual_nodes_size, 16);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partition_settings_builder() {
        let settings = PartitionSettings::new()
            .with_core_topic("core")
            .with_core_partitions(10)
            .with_rule_engine_topic("rules")
            .with_rule_engine_partitions(20)
            .with_hash_function_name("crc32")
            .with_virtual_nodes_size(4);

        assert_eq!(settings.core_topic, "core");
        assert_eq!(settings.core_partitions, 10);
        assert_eq!(settings.rule_engine_topic, "rules");
        assert_eq!(settings.rule_engine_partitions, 20);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partition_settings_validation() {
        let bad_hash = PartitionSettings::new().with_hash_function_name("sha1");
        assert!(matches!(
            bad_hash.validate(),
            Err(Error::UnknownHashFunction(_))
        ));

        let bad_topic = PartitionSettings::new().with_core_topic("");
        assert!(bad_topic.validate().is_err());

        let bad_count = PartitionSettings::new().with_rule_engine_partitions(0);
        assert!(bad_count.validate().is_err());

        let bad_vnodes = PartitionSettings::new().with_virtual_nodes_size(0);
        assert!(bad_vnodes.validate().is_err());
    }

    #[test]
    fn test_transport_api_settings() {
        let settings = TransportApiSettings::default();
        assert_eq!(settings.max_pending_requests, 10_000);
        assert!(settings.validate().is_ok());

        let custom = TransportApiSettings::new()
            .with_requests_topic("api.requests")
            .with_responses_topic("api.responses")
            .with_max_pending_requests(2)
            .with_max_requests_timeout(Duration::from_millis(50))
            .with_response_poll_interval(Duration::from_millis(5));
        assert_eq!(custom.max_pending_requests, 2);
        assert!(custom.validate().is_ok());

        let bad = TransportApiSettings::new().with_max_pending_requests(0);
        assert!(bad.validate().is_err());
    }
}
