//! Single-job processing: fetch, composite, publish.

use std::sync::Arc;
use std::time::Instant;

use burnin_media::Compositor;
use burnin_models::{Artifact, StoragePath, TranscodeJob};
use burnin_storage::ObjectStore;

use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;

/// Where a processed job ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedJob {
    pub output_path: StoragePath,
    pub public_url: String,
    /// False when the job had no overlay and the source was stored as is
    pub composited: bool,
}

/// Runs one job end to end. Settling the message is left to the executor.
#[derive(Clone)]
pub struct JobProcessor {
    store: Arc<dyn ObjectStore>,
    compositor: Arc<dyn Compositor>,
    output_prefix: String,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        compositor: Arc<dyn Compositor>,
        output_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            compositor,
            output_prefix: output_prefix.into(),
        }
    }

    /// Decode `payload` and process the job.
    ///
    /// Returns only once the result is uploaded. Any error before that means
    /// nothing was published.
    pub async fn process(&self, payload: &[u8], logger: &JobLogger) -> WorkerResult<ProcessedJob> {
        let job = TranscodeJob::decode(payload)?;
        logger.log_start(&format!(
            "video={} overlay={}",
            job.video,
            job.overlay.as_ref().map(|p| p.as_str()).unwrap_or("-")
        ));

        let video = self.fetch(&job.video, &job.content_type).await?;
        logger.log_progress(&format!("fetched {} ({} bytes)", video.path, video.len()));

        let (data, composited) = match &job.overlay {
            Some(overlay_path) => {
                let overlay = self.store.read(overlay_path).await?;
                logger.log_progress(&format!(
                    "fetched {} ({} bytes)",
                    overlay_path,
                    overlay.len()
                ));

                let started = Instant::now();
                let result = self.compositor.composite(&video.data, &overlay).await;
                metrics::record_compositor(started.elapsed());
                (result?, true)
            }
            None => (video.into_data(), false),
        };

        let output_path = job.output_path(&self.output_prefix);
        let public_url = self
            .store
            .write(&output_path, data, &job.content_type)
            .await?;

        Ok(ProcessedJob {
            output_path,
            public_url,
            composited,
        })
    }

    async fn fetch(&self, path: &StoragePath, content_type: &str) -> WorkerResult<Artifact> {
        let data = self.store.read(path).await?;
        Ok(Artifact::new(path.clone(), content_type, data))
    }
}
