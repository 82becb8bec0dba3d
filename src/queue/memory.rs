//! In-memory topic registry and the producer/consumer handles over it.
//!
//! Topics are unbounded MPMC FIFO queues created lazily on first use by
//! either side. Message order within a topic is the linearized order of
//! successful sends across all producers; nothing is ordered across topics.
//!
//! The producer and consumer contracts are traits so a distributed
//! transport can replace the in-memory one without touching callers.

use crate::error::Result;
use crate::queue::msg::{QueueCallback, QueueMsg};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Sends messages to one topic.
pub trait QueueProducer: Send + Sync {
    /// The topic this producer publishes to.
    fn topic(&self) -> &str;

    /// Enqueue a message. The callback, when given, is acknowledged as soon
    /// as the transport accepts the message.
    fn send(&self, msg: QueueMsg, callback: Option<Box<dyn QueueCallback>>) -> Result<()>;
}

/// Reads messages from one topic. Subscription is implicit on construction.
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// The topic this consumer reads from.
    fn topic(&self) -> &str;

    /// Drain available messages, waiting up to `timeout` for the first one.
    /// Returns an empty batch when nothing arrived in time.
    async fn poll(&self, timeout: Duration) -> Vec<QueueMsg>;

    /// Commit consumed offsets. A no-op for the in-memory transport; the
    /// contract exists for transports that track consumer positions.
    fn commit(&self);

    /// Release the topic reference. Subsequent polls return empty batches.
    fn unsubscribe(&self);
}

#[derive(Debug, Default)]
struct TopicQueue {
    messages: Mutex<VecDeque<QueueMsg>>,
    available: Notify,
}

impl TopicQueue {
    fn push(&self, msg: QueueMsg) {
        self.messages.lock().push_back(msg);
        self.available.notify_one();
    }

    fn drain(&self) -> Vec<QueueMsg> {
        self.messages.lock().drain(..).collect()
    }

    fn len(&self) -> usize {
        self.messages.lock().len()
    }

    async fn poll(&self, timeout: Duration) -> Vec<QueueMsg> {
        let deadline = Instant::now() + timeout;
        loop {
            // Arm the wakeup before checking so a push between the check and
            // the await is not lost.
            let notified = self.available.notified();
            let drained = self.drain();
            if !drained.is_empty() {
                return drained;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.drain();
            }
            // Woken; another consumer may have taken the message, so loop.
        }
    }
}

/// Process-wide topic registry: `topic name → queue`, created lazily.
///
/// The registry is a cheap clone-by-handle collaborator handed to producers
/// and consumers at construction; there is no global instance.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueRegistry {
    topics: Arc<DashMap<String, Arc<TopicQueue>>>,
}

impl InMemoryQueueRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, topic: &str) -> Arc<TopicQueue> {
        self.topics
            .entry(topic.to_owned())
            .or_default()
            .value()
            .clone()
    }

    /// Names of every topic created so far.
    pub fn topic_names(&self) -> Vec<String> {
        self.topics.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of messages currently queued on a topic.
    pub fn depth(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|queue| queue.len())
            .unwrap_or(0)
    }
}

/// In-memory [`QueueProducer`].
#[derive(Debug, Clone)]
pub struct InMemoryProducer {
    topic: String,
    queue: Arc<TopicQueue>,
}

impl InMemoryProducer {
    /// Create a producer for `topic`, creating the queue if needed.
    pub fn new(registry: &InMemoryQueueRegistry, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        let queue = registry.queue(&topic);
        Self { topic, queue }
    }
}

impl QueueProducer for InMemoryProducer {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn send(&self, msg: QueueMsg, callback: Option<Box<dyn QueueCallback>>) -> Result<()> {
        self.queue.push(msg);
        if let Some(callback) = callback {
            callback.on_success();
        }
        Ok(())
    }
}

/// In-memory [`QueueConsumer`].
#[derive(Debug)]
pub struct InMemoryConsumer {
    topic: String,
    queue: Mutex<Option<Arc<TopicQueue>>>,
}

impl InMemoryConsumer {
    /// Create a consumer subscribed to `topic`, creating the queue if
    /// needed.
    pub fn new(registry: &InMemoryQueueRegistry, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        let queue = registry.queue(&topic);
        Self {
            topic,
            queue: Mutex::new(Some(queue)),
        }
    }
}

#[async_trait]
impl QueueConsumer for InMemoryConsumer {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn poll(&self, timeout: Duration) -> Vec<QueueMsg> {
        let queue = self.queue.lock().clone();
        match queue {
            Some(queue) => queue.poll(timeout).await,
            None => Vec::new(),
        }
    }

    fn commit(&self) {}

    fn unsubscribe(&self) {
        self.queue.lock().take();
    }
}
