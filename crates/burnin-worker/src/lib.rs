//! Overlay burn-in transcode worker.
//!
//! This crate provides:
//! - Job processing (fetch, composite or pass through, publish)
//! - A consumer loop with per-delivery isolation and dead-lettering
//! - Structured job logging and metrics
//! - Graceful shutdown between jobs

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{DeliveryOutcome, JobExecutor};
pub use logging::JobLogger;
pub use processor::{JobProcessor, ProcessedJob};
