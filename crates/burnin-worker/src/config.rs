//! Worker configuration.

use std::path::PathBuf;

use crate::error::{WorkerError, WorkerResult};

/// Default prefix of published videos.
pub const DEFAULT_OUTPUT_PREFIX: &str = "video";

/// Worker configuration.
///
/// Storage and queue settings live with their clients
/// (`S3Config::from_env`, `QueueConfig::from_env`).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Prefix under which results are stored
    pub output_prefix: String,
    /// Work directory for scratch files
    pub work_dir: PathBuf,
    /// Resolution probe program
    pub probe_program: String,
    /// Compositor program
    pub compositor_program: String,
    /// Port of the Prometheus endpoint, disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            work_dir: PathBuf::from("/tmp/burnin"),
            probe_program: "ffprobe".to_string(),
            compositor_program: "ffmpeg".to_string(),
            metrics_port: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let metrics_port = match std::env::var("METRICS_PORT") {
            Ok(port) if !port.trim().is_empty() => Some(port.trim().parse().map_err(|_| {
                WorkerError::config_error(format!("METRICS_PORT is not a port: {}", port))
            })?),
            _ => None,
        };

        Ok(Self {
            output_prefix: std::env::var("STORAGE_OUTPUT_PREFIX")
                .unwrap_or(defaults.output_prefix),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            probe_program: std::env::var("PROBE_PROGRAM").unwrap_or(defaults.probe_program),
            compositor_program: std::env::var("COMPOSITOR_PROGRAM")
                .unwrap_or(defaults.compositor_program),
            metrics_port,
        })
    }
}
