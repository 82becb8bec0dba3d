//! Wiring of the in-memory queue fabric: per-role producers, the
//! per-instance notifications consumer, and the transport-API
//! request/response template.
//!
//! Every handle built here shares one registry, so producers and consumers
//! created for the same topic meet on the same queue. Topics are
//! parameterized per role; the core and rule-engine dispatch paths never
//! share a queue with the transport-API channels.

use crate::config::{PartitionSettings, TransportApiSettings};
use crate::queue::memory::{InMemoryConsumer, InMemoryProducer, InMemoryQueueRegistry};
use crate::queue::request_template::RequestTemplate;
use crate::types::TopicPartitionInfo;
use std::sync::Arc;

/// Factory for the in-memory transport's producers, consumers, and the
/// transport-API template.
#[derive(Debug, Clone)]
pub struct InMemoryQueueProvider {
    registry: InMemoryQueueRegistry,
    partition_settings: PartitionSettings,
    transport_api_settings: TransportApiSettings,
}

impl InMemoryQueueProvider {
    /// Create a provider over a shared registry.
    pub fn new(
        registry: InMemoryQueueRegistry,
        partition_settings: PartitionSettings,
        transport_api_settings: TransportApiSettings,
    ) -> Self {
        Self {
            registry,
            partition_settings,
            transport_api_settings,
        }
    }

    /// The shared registry.
    pub fn registry(&self) -> &InMemoryQueueRegistry {
        &self.registry
    }

    /// Producer for messages addressed to the core role.
    pub fn core_msg_producer(&self) -> InMemoryProducer {
        InMemoryProducer::new(&self.registry, &self.partition_settings.core_topic)
    }

    /// Producer for messages addressed to the rule-engine role.
    pub fn rule_engine_msg_producer(&self) -> InMemoryProducer {
        InMemoryProducer::new(&self.registry, &self.partition_settings.rule_engine_topic)
    }

    /// Producer for an already-resolved destination.
    pub fn producer_for(&self, tpi: &TopicPartitionInfo) -> InMemoryProducer {
        InMemoryProducer::new(&self.registry, tpi.full_topic_name())
    }

    /// Consumer for an already-resolved destination (an owned partition or
    /// a notifications topic).
    pub fn consumer_for(&self, tpi: &TopicPartitionInfo) -> InMemoryConsumer {
        InMemoryConsumer::new(&self.registry, tpi.full_topic_name())
    }

    /// Request/response template over the transport-API topics. The caller
    /// starts it with [`RequestTemplate::init`].
    pub fn transport_api_request_template(&self) -> RequestTemplate {
        let producer = Arc::new(InMemoryProducer::new(
            &self.registry,
            &self.transport_api_settings.requests_topic,
        ));
        let consumer = Arc::new(InMemoryConsumer::new(
            &self.registry,
            &self.transport_api_settings.responses_topic,
        ));
        RequestTemplate::new(producer, consumer, &self.transport_api_settings)
    }

    /// Server-side consumer of transport-API requests.
    pub fn transport_api_request_consumer(&self) -> InMemoryConsumer {
        InMemoryConsumer::new(&self.registry, &self.transport_api_settings.requests_topic)
    }

    /// Server-side producer of transport-API responses.
    pub fn transport_api_response_producer(&self) -> InMemoryProducer {
        InMemoryProducer::new(&self.registry, &self.transport_api_settings.responses_topic)
    }
}
