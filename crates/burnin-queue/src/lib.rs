//! Job subscription on Redis Streams.
//!
//! This crate provides:
//! - The `MessageQueue` seam used by the consumer loop
//! - Pull-based delivery with an ack deadline and redelivery
//! - Bounded delivery attempts and a dead-letter stream
//! - Job publishing for the ingest side

pub mod delivery;
pub mod error;
pub mod queue;

pub use delivery::{Delivery, MessageHandle, MessageQueue};
pub use error::{QueueError, QueueResult};
pub use queue::{QueueConfig, RedisQueue};
