//! Request/response correlation over a producer + consumer pair.
//!
//! Every send stamps the outgoing message with a fresh UUID, records it in a
//! bounded pending map, and hands back a future. A dedicated poller task
//! drains the response consumer and completes the matching future; an expiry
//! task sweeps the pending map and fails overdue futures. Whichever path
//! reaches a pending entry first wins; the other becomes a no-op.

use crate::config::TransportApiSettings;
use crate::error::{Error, Result};
use crate::queue::memory::{QueueConsumer, QueueProducer};
use crate::queue::msg::QueueMsg;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

struct PendingRequest {
    tx: oneshot::Sender<Result<QueueMsg>>,
    expires_at: Instant,
}

struct Shared {
    pending: DashMap<Uuid, PendingRequest>,
    pending_count: AtomicUsize,
    max_pending: usize,
    max_request_timeout: Duration,
    stopped: AtomicBool,
}

impl Shared {
    /// Remove and complete a pending entry. Removal is idempotent; the
    /// losing path of a response/timeout race finds nothing.
    fn complete(&self, request_id: &Uuid, result: Result<QueueMsg>) -> bool {
        match self.pending.remove(request_id) {
            Some((_, entry)) => {
                self.pending_count.fetch_sub(1, Ordering::AcqRel);
                let _ = entry.tx.send(result);
                true
            }
            None => false,
        }
    }
}

/// Future resolving to the correlated response.
///
/// Completes exactly once: with the response, `Error::Timeout` when the
/// deadline passes first, or `Error::Cancelled` on template shutdown.
pub struct ResponseFuture {
    rx: oneshot::Receiver<Result<QueueMsg>>,
}

impl Future for ResponseFuture {
    type Output = Result<QueueMsg>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Correlates responses to outstanding requests by message key.
pub struct RequestTemplate {
    producer: Arc<dyn QueueProducer>,
    consumer: Arc<dyn QueueConsumer>,
    shared: Arc<Shared>,
    poll_interval: Duration,
    poller: Mutex<Option<JoinHandle<()>>>,
    expirer: Mutex<Option<JoinHandle<()>>>,
}

impl RequestTemplate {
    /// Create a template over a request producer and a response consumer.
    /// Call [`init`](Self::init) from a runtime context before sending.
    pub fn new(
        producer: Arc<dyn QueueProducer>,
        consumer: Arc<dyn QueueConsumer>,
        settings: &TransportApiSettings,
    ) -> Self {
        Self {
            producer,
            consumer,
            shared: Arc::new(Shared {
                pending: DashMap::new(),
                pending_count: AtomicUsize::new(0),
                max_pending: settings.max_pending_requests,
                max_request_timeout: settings.max_requests_timeout,
                stopped: AtomicBool::new(false),
            }),
            poll_interval: settings.response_poll_interval,
            poller: Mutex::new(None),
            expirer: Mutex::new(None),
        }
    }

    /// Start the response poller and the expiry sweep. Idempotent.
    pub fn init(&self) {
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return;
        }

        let consumer = self.consumer.clone();
        let shared = self.shared.clone();
        let interval = self.poll_interval;
        *poller = Some(tokio::spawn(async move {
            while !shared.stopped.load(Ordering::Acquire) {
                for msg in consumer.poll(interval).await {
                    let request_id = msg.key;
                    if !shared.complete(&request_id, Ok(msg)) {
                        tracing::warn!(
                            request_id = %request_id,
                            "Discarding response for unknown request"
                        );
                    }
                }
            }
        }));

        let shared = self.shared.clone();
        let tick_interval = self.poll_interval;
        *self.expirer.lock() = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(tick_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            while !shared.stopped.load(Ordering::Acquire) {
                tick.tick().await;
                let now = Instant::now();
                let expired: Vec<Uuid> = shared
                    .pending
                    .iter()
                    .filter(|entry| entry.value().expires_at <= now)
                    .map(|entry| *entry.key())
                    .collect();
                for request_id in expired {
                    if shared.complete(&request_id, Err(Error::Timeout)) {
                        tracing::warn!(
                            request_id = %request_id,
                            "Request timed out awaiting response"
                        );
                    }
                }
            }
        }));
    }

    /// Send a request and return the future of its response.
    ///
    /// The message key is overwritten with a freshly generated request id.
    /// Fails synchronously with [`Error::QueueFull`] when
    /// `max_pending_requests` are already outstanding, and with
    /// [`Error::Cancelled`] after shutdown.
    pub fn send(&self, mut msg: QueueMsg) -> Result<ResponseFuture> {
        if self.shared.stopped.load(Ordering::Acquire) {
            return Err(Error::Cancelled);
        }

        let reserve = self.shared.pending_count.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |count| (count < self.shared.max_pending).then_some(count + 1),
        );
        if let Err(pending) = reserve {
            return Err(Error::QueueFull {
                pending,
                max: self.shared.max_pending,
            });
        }

        let request_id = Uuid::new_v4();
        msg.key = request_id;
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(
            request_id,
            PendingRequest {
                tx,
                expires_at: Instant::now() + self.shared.max_request_timeout,
            },
        );

        if let Err(e) = self.producer.send(msg, None) {
            // Roll back the reservation; nothing will ever complete it.
            self.shared.complete(&request_id, Err(Error::Cancelled));
            return Err(e);
        }

        Ok(ResponseFuture { rx })
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending_count.load(Ordering::Acquire)
    }

    /// Stop both background tasks, unsubscribe the response consumer, and
    /// fail every outstanding future with [`Error::Cancelled`]. Idempotent.
    pub fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.poller.lock().take() {
            handle.abort();
        }
        if let Some(handle) = self.expirer.lock().take() {
            handle.abort();
        }
        let outstanding: Vec<Uuid> = self
            .shared
            .pending
            .iter()
            .map(|entry| *entry.key())
            .collect();
        for request_id in outstanding {
            self.shared.complete(&request_id, Err(Error::Cancelled));
        }
        self.consumer.unsubscribe();
    }
}

impl Drop for RequestTemplate {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for RequestTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTemplate")
            .field("request_topic", &self.producer.topic())
            .field("response_topic", &self.consumer.topic())
            .field("pending_count", &self.pending_count())
            .field("max_pending", &self.shared.max_pending)
            .finish()
    }
}
