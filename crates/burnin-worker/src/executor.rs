//! Job executor.
//!
//! Pulls one delivery at a time, processes it in isolation and settles it.
//! A failing or panicking job never stops the loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use burnin_queue::{Delivery, MessageQueue};
use futures::FutureExt;
use tokio::sync::watch;
use tracing::{error, info, warn, Instrument};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::processor::{JobProcessor, ProcessedJob};

/// Wait after a failed pull before trying again.
const PULL_BACKOFF: Duration = Duration::from_secs(5);

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Processed and acknowledged
    Acknowledged,
    /// Failed; left unacknowledged for redelivery
    Retrying { attempts: u32 },
    /// Moved to the dead-letter path
    DeadLettered,
    /// Could not be settled; the broker redelivers after the ack deadline
    Unsettled,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Acknowledged => "acknowledged",
            DeliveryOutcome::Retrying { .. } => "retrying",
            DeliveryOutcome::DeadLettered => "dead_lettered",
            DeliveryOutcome::Unsettled => "unsettled",
        }
    }
}

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    queue: Arc<dyn MessageQueue>,
    processor: JobProcessor,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(queue: Arc<dyn MessageQueue>, processor: JobProcessor) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            queue,
            processor,
            shutdown,
        }
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    ///
    /// Shutdown is observed between jobs; a job in progress always finishes.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor (max deliveries {})",
            self.queue.max_deliveries()
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let pulled = tokio::select! {
                _ = shutdown_rx.changed() => continue,
                pulled = self.queue.pull() => pulled,
            };

            match pulled {
                Ok(delivery) => {
                    self.handle(delivery).await;
                }
                Err(e) => {
                    error!("Failed to pull job: {}", e);
                    tokio::select! {
                        _ = shutdown_rx.changed() => {}
                        _ = tokio::time::sleep(PULL_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Pull one delivery and settle it.
    pub async fn process_next(&self) -> WorkerResult<DeliveryOutcome> {
        let delivery = self.queue.pull().await?;
        Ok(self.handle(delivery).await)
    }

    /// Process and settle one delivery. Never fails: every error is
    /// turned into an outcome.
    pub async fn handle(&self, delivery: Delivery) -> DeliveryOutcome {
        let started = Instant::now();
        let logger = JobLogger::new(&delivery.handle, "burn_in");
        let span = logger.create_span();

        let outcome = async {
            let result = self.attempt(&delivery, &logger).await;
            self.settle(&delivery, result, &logger).await
        }
        .instrument(span)
        .await;

        metrics::record_job(outcome.as_str(), started.elapsed());
        outcome
    }

    /// Signal shutdown. Sticky: a later [`run`](Self::run) returns at once.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    async fn attempt(&self, delivery: &Delivery, logger: &JobLogger) -> WorkerResult<ProcessedJob> {
        AssertUnwindSafe(self.processor.process(&delivery.payload, logger))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(WorkerError::internal(format!(
                    "job panicked: {}",
                    panic_message(panic.as_ref())
                )))
            })
    }

    async fn settle(
        &self,
        delivery: &Delivery,
        result: WorkerResult<ProcessedJob>,
        logger: &JobLogger,
    ) -> DeliveryOutcome {
        let err = match result {
            Ok(processed) => {
                return match self.queue.ack(&delivery.handle).await {
                    Ok(()) => {
                        logger.log_completion(&format!(
                            "{} -> {}",
                            processed.output_path, processed.public_url
                        ));
                        DeliveryOutcome::Acknowledged
                    }
                    Err(e) => {
                        logger.log_warning(&format!("published but ack failed: {}", e));
                        DeliveryOutcome::Unsettled
                    }
                };
            }
            Err(err) => err,
        };

        logger.log_failure(&err);
        metrics::record_failure(err.kind());

        if err.is_malformed() {
            return self.dead_letter(delivery, &err, logger).await;
        }

        match self.queue.record_failure(&delivery.handle).await {
            Ok(attempts) if attempts >= self.queue.max_deliveries() => {
                logger.log_warning(&format!("giving up after {} attempts", attempts));
                self.dead_letter(delivery, &err, logger).await
            }
            Ok(attempts) => {
                logger.log_progress(&format!(
                    "attempt {} of {} failed, awaiting redelivery",
                    attempts,
                    self.queue.max_deliveries()
                ));
                DeliveryOutcome::Retrying { attempts }
            }
            Err(e) => {
                logger.log_warning(&format!("could not record failure: {}", e));
                DeliveryOutcome::Unsettled
            }
        }
    }

    async fn dead_letter(
        &self,
        delivery: &Delivery,
        err: &WorkerError,
        logger: &JobLogger,
    ) -> DeliveryOutcome {
        match self.queue.dead_letter(delivery, &err.to_string()).await {
            Ok(()) => {
                warn!(job_id = %delivery.handle, kind = err.kind(), "Job dead-lettered");
                DeliveryOutcome::DeadLettered
            }
            Err(e) => {
                logger.log_warning(&format!("dead-letter failed: {}", e));
                DeliveryOutcome::Unsettled
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
