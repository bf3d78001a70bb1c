//! Deliveries and the queue abstraction.

use std::fmt;

use async_trait::async_trait;

use crate::error::QueueResult;

/// Opaque identifier of one delivered message, used to settle it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle(String);

impl MessageHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pulled message. The payload is kept raw; decoding is the executor's job.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub handle: MessageHandle,
    pub payload: Vec<u8>,
}

impl Delivery {
    pub fn new(handle: MessageHandle, payload: Vec<u8>) -> Self {
        Self { handle, payload }
    }
}

/// At-least-once, pull-based subscription.
///
/// A delivery that is not acknowledged before the ack deadline is delivered
/// again, possibly to another worker.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Block until one message is available.
    async fn pull(&self) -> QueueResult<Delivery>;

    /// Mark a message as processed so it is never redelivered.
    async fn ack(&self, handle: &MessageHandle) -> QueueResult<()>;

    /// Count a failed attempt and return the number of failures so far.
    async fn record_failure(&self, handle: &MessageHandle) -> QueueResult<u32>;

    /// Park a message on the dead-letter path and acknowledge the original.
    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()>;

    /// Failed attempts after which a message is dead-lettered.
    fn max_deliveries(&self) -> u32;
}
