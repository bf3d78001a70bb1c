//! Overlay burn-in worker binary.

use std::sync::Arc;

use tracing::{error, info};

use burnin_media::{
    ExternalTool, OverlayCompositor, ResolutionProber, ScratchSpace, FFPROBE_SIZE_ARGS,
};
use burnin_queue::RedisQueue;
use burnin_storage::S3Store;
use burnin_worker::logging::init_tracing;
use burnin_worker::{metrics, JobExecutor, JobProcessor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS Redis connections)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting burnin-worker");

    let config = match WorkerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid worker configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        if let Err(e) = metrics::init_prometheus(port) {
            error!("Failed to start metrics exporter: {}", e);
            std::process::exit(1);
        }
        info!("Serving metrics on port {}", port);
    }

    let store = match S3Store::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match RedisQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = queue.init().await {
        error!("Failed to initialize consumer group: {}", e);
        std::process::exit(1);
    }

    let scratch = ScratchSpace::new(&config.work_dir);
    let probe_tool = FFPROBE_SIZE_ARGS
        .iter()
        .fold(ExternalTool::new(&config.probe_program), |tool, arg| {
            tool.with_arg(*arg)
        });
    let prober = ResolutionProber::new(probe_tool, scratch.clone());
    let compositor = OverlayCompositor::new(
        prober,
        ExternalTool::new(&config.compositor_program),
        scratch,
    );

    let processor = JobProcessor::new(
        Arc::new(store),
        Arc::new(compositor),
        config.output_prefix.clone(),
    );
    let executor = Arc::new(JobExecutor::new(Arc::new(queue), processor));

    // Setup signal handlers
    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal, finishing current job");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
