//! Job subscription using Redis Streams.

use std::time::Duration;

use async_trait::async_trait;
use burnin_models::TranscodeJob;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::delivery::{Delivery, MessageHandle, MessageQueue};
use crate::error::{QueueError, QueueResult};

/// Stream entry field holding the job payload.
const PAYLOAD_FIELD: &str = "job";

/// TTL of per-message failure counters.
const RETRY_COUNTER_TTL_SECS: i64 = 86_400;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Project identifier, namespaces every key
    pub project_id: String,
    /// Topic (stream) jobs are published to
    pub topic: String,
    /// Subscription (consumer group) workers pull from
    pub subscription: String,
    /// Time a pulled message may stay unacknowledged before redelivery
    pub ack_deadline: Duration,
    /// Failed attempts before a message is dead-lettered
    pub max_deliveries: u32,
    /// How long a pull blocks before re-checking for expired deliveries
    pub claim_interval: Duration,
}

impl QueueConfig {
    /// Create a config with default deadlines.
    pub fn new(
        redis_url: impl Into<String>,
        project_id: impl Into<String>,
        topic: impl Into<String>,
        subscription: impl Into<String>,
    ) -> Self {
        Self {
            redis_url: redis_url.into(),
            project_id: project_id.into(),
            topic: topic.into(),
            subscription: subscription.into(),
            ack_deadline: Duration::from_secs(60),
            max_deliveries: 5,
            claim_interval: Duration::from_secs(5),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Ok(Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            project_id: required_env("PROJECT_ID")?,
            topic: required_env("QUEUE_TOPIC")?,
            subscription: required_env("QUEUE_SUBSCRIPTION")?,
            ack_deadline: Duration::from_secs(
                std::env::var("QUEUE_ACK_DEADLINE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_deliveries: std::env::var("QUEUE_MAX_DELIVERIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(5),
            claim_interval: Duration::from_secs(
                std::env::var("QUEUE_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(5),
            ),
        })
    }

    /// Stream holding published jobs.
    pub fn stream_key(&self) -> String {
        format!("{}:{}", self.project_id, self.topic)
    }

    /// Stream holding dead-lettered jobs.
    pub fn dead_letter_key(&self) -> String {
        format!("{}:dead-letter", self.stream_key())
    }

    /// Failure counter of one message.
    pub fn retry_key(&self, handle: &MessageHandle) -> String {
        format!("{}:retry:{}", self.stream_key(), handle)
    }
}

fn required_env(name: &str) -> QueueResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(QueueError::config_error(format!("{} not set", name))),
    }
}

/// Redis Streams subscription client.
pub struct RedisQueue {
    client: redis::Client,
    config: QueueConfig,
    consumer_name: String,
}

impl RedisQueue {
    /// Create a new queue client.
    pub fn new(config: QueueConfig, consumer_name: impl Into<String>) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            config,
            consumer_name: consumer_name.into(),
        })
    }

    /// Create from environment variables with a random consumer name.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env()?, format!("worker-{}", Uuid::new_v4()))
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    async fn connection(&self) -> QueueResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    /// Initialize the subscription (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        // Start at the beginning so a backlog published before the first worker is kept
        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(self.config.stream_key())
            .arg(&self.config.subscription)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created subscription: {}", self.config.subscription),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Subscription already exists: {}", self.config.subscription);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Publish a job to the topic.
    pub async fn publish(&self, job: &TranscodeJob) -> QueueResult<MessageHandle> {
        let mut conn = self.connection().await?;
        let payload = job.encode()?;

        let message_id: String = redis::cmd("XADD")
            .arg(self.config.stream_key())
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::publish_failed(e.to_string()))?;

        info!("Published job for {} with message ID {}", job.video, message_id);
        Ok(MessageHandle::new(message_id))
    }

    /// Get topic length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(self.config.stream_key()).await?;
        Ok(len)
    }

    /// Get dead-letter stream length.
    pub async fn dead_letter_len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(self.config.dead_letter_key()).await?;
        Ok(len)
    }

    /// Claim one delivery whose ack deadline has passed.
    ///
    /// Entries already delivered `max_deliveries` times are dead-lettered
    /// instead of being handed out again.
    async fn claim_expired(&self, conn: &mut MultiplexedConnection) -> QueueResult<Option<Delivery>> {
        let min_idle_ms = self.config.ack_deadline.as_millis() as u64;

        loop {
            let pending: StreamPendingCountReply = redis::cmd("XPENDING")
                .arg(self.config.stream_key())
                .arg(&self.config.subscription)
                .arg("IDLE")
                .arg(min_idle_ms)
                .arg("-")
                .arg("+")
                .arg(1)
                .query_async(&mut *conn)
                .await?;

            let Some(expired) = pending.ids.into_iter().next() else {
                return Ok(None);
            };

            // Another worker may win the race; XCLAIM then returns nothing
            let claimed: StreamClaimReply = redis::cmd("XCLAIM")
                .arg(self.config.stream_key())
                .arg(&self.config.subscription)
                .arg(&self.consumer_name)
                .arg(min_idle_ms)
                .arg(&expired.id)
                .query_async(&mut *conn)
                .await?;

            let Some(entry) = claimed.ids.into_iter().next() else {
                return Ok(None);
            };
            let delivery = to_delivery(entry);

            if delivery_limit_reached(expired.times_delivered, self.config.max_deliveries) {
                let reason = format!(
                    "delivered {} times without being settled",
                    expired.times_delivered
                );
                self.dead_letter(&delivery, &reason).await?;
                continue;
            }

            info!(
                "Redelivering message {} (previous consumer {}, delivered {} times)",
                delivery.handle, expired.consumer, expired.times_delivered
            );
            return Ok(Some(delivery));
        }
    }

    /// Read one new message, waiting at most the claim interval.
    async fn read_new(&self, conn: &mut MultiplexedConnection) -> QueueResult<Option<Delivery>> {
        let block_ms = self.config.claim_interval.as_millis() as u64;

        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.subscription)
            .arg(&self.consumer_name)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(self.config.stream_key())
            .arg(">") // Only new messages
            .query_async(conn)
            .await?;

        Ok(reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .next()
            .map(to_delivery))
    }
}

/// Whether a message delivered `times_delivered` times must not be handed out again.
fn delivery_limit_reached(times_delivered: usize, max_deliveries: u32) -> bool {
    times_delivered >= max_deliveries as usize
}

fn to_delivery(entry: StreamId) -> Delivery {
    // A missing payload field reaches the executor as an empty (malformed) body
    let payload: Vec<u8> = entry.get(PAYLOAD_FIELD).unwrap_or_default();
    Delivery::new(MessageHandle::new(entry.id), payload)
}

#[async_trait]
impl MessageQueue for RedisQueue {
    async fn pull(&self) -> QueueResult<Delivery> {
        let mut conn = self.connection().await?;

        loop {
            if let Some(delivery) = self.claim_expired(&mut conn).await? {
                return Ok(delivery);
            }
            if let Some(delivery) = self.read_new(&mut conn).await? {
                debug!("Pulled message {}", delivery.handle);
                return Ok(delivery);
            }
        }
    }

    async fn ack(&self, handle: &MessageHandle) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XACK")
            .arg(self.config.stream_key())
            .arg(&self.config.subscription)
            .arg(handle.as_str())
            .query_async::<()>(&mut conn)
            .await?;

        // Delete the message from the stream
        redis::cmd("XDEL")
            .arg(self.config.stream_key())
            .arg(handle.as_str())
            .query_async::<()>(&mut conn)
            .await?;

        conn.del::<_, ()>(self.config.retry_key(handle)).await?;

        debug!("Acknowledged message: {}", handle);
        Ok(())
    }

    async fn record_failure(&self, handle: &MessageHandle) -> QueueResult<u32> {
        let mut conn = self.connection().await?;

        let key = self.config.retry_key(handle);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, RETRY_COUNTER_TTL_SECS).await?;
        Ok(count)
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XADD")
            .arg(self.config.dead_letter_key())
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(delivery.payload.as_slice())
            .arg("error")
            .arg(reason)
            .arg("original_id")
            .arg(delivery.handle.as_str())
            .arg("failed_at")
            .arg(chrono::Utc::now().to_rfc3339())
            .query_async::<()>(&mut conn)
            .await?;

        // Ack the original message
        self.ack(&delivery.handle).await?;

        warn!("Moved message {} to dead-letter stream: {}", delivery.handle, reason);
        Ok(())
    }

    fn max_deliveries(&self) -> u32 {
        self.config.max_deliveries
    }
}
