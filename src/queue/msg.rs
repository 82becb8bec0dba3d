//! Queue message value and send-acknowledgement callback.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Message routed through the queue fabric.
///
/// `key` doubles as the correlation id for request/response exchanges; the
/// request template stamps it, everyone else picks their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMsg {
    /// Message key; correlation id on request/response channels.
    pub key: Uuid,
    /// Optional transport headers.
    pub headers: HashMap<String, Vec<u8>>,
    /// Opaque payload.
    pub payload: Bytes,
}

impl QueueMsg {
    /// Create a message with an explicit key.
    pub fn new(key: Uuid, payload: impl Into<Bytes>) -> Self {
        Self {
            key,
            headers: HashMap::new(),
            payload: payload.into(),
        }
    }

    /// Create a message with a random key.
    pub fn from_payload(payload: impl Into<Bytes>) -> Self {
        Self::new(Uuid::new_v4(), payload)
    }

    /// Attach a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Serialize the message to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a message from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Acknowledgement callback for a producer send.
///
/// The in-memory transport acknowledges synchronously on enqueue; a
/// distributed transport acknowledges from its delivery path, and may fail.
pub trait QueueCallback: Send + Sync {
    /// The message was accepted by the transport.
    fn on_success(&self);

    /// The transport rejected the message.
    fn on_failure(&self, error: &Error);
}
