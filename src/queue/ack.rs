//! Batch acknowledgement for consumer worker pools.
//!
//! A worker that polls a batch of messages and dispatches them to parallel
//! processors needs to know when the whole batch has been acknowledged
//! before committing and polling again. [`MsgPackContext`] tracks the
//! outstanding messages of one batch; each processor acknowledges through
//! its own [`MsgPackCallback`]. Failures are logged and still drain the
//! batch, so one bad message never wedges the worker.

use crate::error::Error;
use crate::queue::msg::{QueueCallback, QueueMsg};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

/// Tracks acknowledgement of one polled batch.
#[derive(Debug, Clone)]
pub struct MsgPackContext {
    ack_map: Arc<DashMap<Uuid, QueueMsg>>,
    processed: Arc<Notify>,
}

impl MsgPackContext {
    /// Create a context over a polled batch, keyed by message key.
    pub fn new(msgs: &[QueueMsg]) -> Self {
        let ack_map = Arc::new(DashMap::new());
        for msg in msgs {
            ack_map.insert(msg.key, msg.clone());
        }
        Self {
            ack_map,
            processed: Arc::new(Notify::new()),
        }
    }

    /// Callback for acknowledging one message of the batch.
    pub fn callback(&self, id: Uuid) -> MsgPackCallback {
        MsgPackCallback {
            id,
            ack_map: self.ack_map.clone(),
            processed: self.processed.clone(),
        }
    }

    /// Messages not yet acknowledged.
    pub fn remaining(&self) -> usize {
        self.ack_map.len()
    }

    /// Wait until every message of the batch is acknowledged or the timeout
    /// passes. Returns whether the batch fully drained.
    pub async fn await_completion(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.processed.notified();
            if self.ack_map.is_empty() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.ack_map.is_empty();
            }
        }
    }
}

/// Acknowledgement callback for one message of a batch.
pub struct MsgPackCallback {
    id: Uuid,
    ack_map: Arc<DashMap<Uuid, QueueMsg>>,
    processed: Arc<Notify>,
}

impl QueueCallback for MsgPackCallback {
    fn on_success(&self) {
        if self.ack_map.remove(&self.id).is_some() && self.ack_map.is_empty() {
            self.processed.notify_waiters();
        }
    }

    fn on_failure(&self, error: &Error) {
        if let Some((_, msg)) = self.ack_map.remove(&self.id) {
            tracing::warn!(
                id = %self.id,
                payload_len = msg.payload.len(),
                %error,
                "Failed to process message"
            );
            if self.ack_map.is_empty() {
                self.processed.notify_waiters();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn batch(n: usize) -> Vec<QueueMsg> {
        (0..n)
            .map(|i| QueueMsg::from_payload(Bytes::copy_from_slice(&[i as u8])))
            .collect()
    }

    #[tokio::test]
    async fn test_all_acked_completes() {
        let msgs = batch(3);
        let ctx = MsgPackContext::new(&msgs);
        assert_eq!(ctx.remaining(), 3);

        for msg in &msgs {
            ctx.callback(msg.key).on_success();
        }
        assert!(ctx.await_completion(Duration::from_millis(50)).await);
        assert_eq!(ctx.remaining(), 0);
    }

    #[tokio::test]
    async fn test_failure_still_drains() {
        let msgs = batch(2);
        let ctx = MsgPackContext::new(&msgs);

        ctx.callback(msgs[0].key).on_success();
        ctx.callback(msgs[1].key)
            .on_failure(&Error::Internal("processor crashed".into()));

        assert!(ctx.await_completion(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_unacked_batch_times_out() {
        let msgs = batch(2);
        let ctx = MsgPackContext::new(&msgs);
        ctx.callback(msgs[0].key).on_success();

        assert!(!ctx.await_completion(Duration::from_millis(20)).await);
        assert_eq!(ctx.remaining(), 1);
    }

    #[tokio::test]
    async fn test_ack_from_another_task_wakes_waiter() {
        let msgs = batch(1);
        let ctx = MsgPackContext::new(&msgs);
        let callback = ctx.callback(msgs[0].key);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            callback.on_success();
        });

        assert!(ctx.await_completion(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_double_ack_is_idempotent() {
        let msgs = batch(1);
        let ctx = MsgPackContext::new(&msgs);
        let callback = ctx.callback(msgs[0].key);
        callback.on_success();
        callback.on_success();
        assert!(ctx.await_completion(Duration::from_millis(10)).await);
    }
}
