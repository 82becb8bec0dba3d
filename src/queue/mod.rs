//! In-memory queue fabric under the resolved routing decisions.
//!
//! Producers and consumers are thin handles over a shared topic registry;
//! the request/response template layers request correlation on top of a
//! producer + consumer pair. All contracts are traits so a distributed
//! transport can replace the in-memory one without touching callers.

pub mod ack;
pub mod memory;
pub mod msg;
pub mod provider;
pub mod request_template;

pub use ack::{MsgPackCallback, MsgPackContext};
pub use memory::{
    InMemoryConsumer, InMemoryProducer, InMemoryQueueRegistry, QueueConsumer, QueueProducer,
};
pub use msg::{QueueCallback, QueueMsg};
pub use provider::InMemoryQueueProvider;
pub use request_template::{RequestTemplate, ResponseFuture};
