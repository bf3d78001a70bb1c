//! Consumer loop and job processing against in-memory doubles.

mod common;

use std::sync::Arc;
use std::time::Duration;

use burnin_media::{Compositor, OverlayCompositor, ResolutionProber, ScratchSpace};
use burnin_worker::{DeliveryOutcome, JobExecutor, JobLogger, JobProcessor, WorkerError};
use common::*;
use image::GenericImageView;

fn executor(
    queue: &Arc<MemoryQueue>,
    store: &Arc<MemoryStore>,
    compositor: Arc<dyn Compositor>,
) -> JobExecutor {
    let processor = JobProcessor::new(store.clone(), compositor, "video");
    JobExecutor::new(queue.clone(), processor)
}

fn staged_store() -> MemoryStore {
    MemoryStore::default()
        .with_object("staging/abc.mp4", b"source video bytes")
        .with_object("staging/ov.png", &png(32, 24))
}

fn sh_compositor(scratch: &std::path::Path, script: &str) -> Arc<dyn Compositor> {
    let scratch = ScratchSpace::new(scratch);
    let prober = ResolutionProber::new(sh(FAKE_PROBE), scratch.clone());
    Arc::new(OverlayCompositor::new(prober, sh(script), scratch))
}

fn scratch_entries(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_without_overlay_stores_source_unmodified() {
    let queue = Arc::new(MemoryQueue::new(5));
    let store = Arc::new(staged_store());
    let compositor = Arc::new(CountingCompositor::default());
    let executor = executor(&queue, &store, compositor.clone());

    let delivery = queue.push(JOB_WITHOUT_OVERLAY);
    let outcome = executor.process_next().await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::Acknowledged);
    assert_eq!(compositor.calls(), 0);
    assert_eq!(
        store.object("video/abc.mp4"),
        Some((b"source video bytes".to_vec(), "video/mp4".to_string()))
    );
    assert_eq!(queue.acked(), vec![delivery.handle]);
}

#[tokio::test]
async fn test_processor_reports_output_location() {
    let store = Arc::new(staged_store());
    let processor = JobProcessor::new(store.clone(), Arc::new(CountingCompositor::default()), "/video/");
    let logger = JobLogger::from_string("test-job", "burn_in");

    let processed = processor.process(JOB_WITH_OVERLAY, &logger).await.unwrap();

    assert_eq!(processed.output_path.as_str(), "video/abc.mp4");
    assert_eq!(processed.public_url, "memory://video/abc.mp4");
    assert!(processed.composited);
    assert_eq!(store.object("video/abc.mp4").unwrap().0, b"composited");
}

#[tokio::test]
async fn test_processor_rejects_malformed_payload() {
    let store = Arc::new(staged_store());
    let processor = JobProcessor::new(store.clone(), Arc::new(CountingCompositor::default()), "video");
    let logger = JobLogger::from_string("test-job", "burn_in");

    let err = processor
        .process(br#"{"overlay": "staging/ov.png"}"#, &logger)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::MalformedJob(_)));
    assert!(store.writes().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_overlay_job_end_to_end() {
    let scratch = tempfile::tempdir().unwrap();
    let queue = Arc::new(MemoryQueue::new(5));
    let store = Arc::new(staged_store());
    let executor = executor(&queue, &store, sh_compositor(scratch.path(), FAKE_COMPOSITOR));

    let delivery = queue.push(JOB_WITH_OVERLAY);
    let outcome = executor.process_next().await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::Acknowledged);
    assert_eq!(queue.acked(), vec![delivery.handle]);

    // The fake compositor emits the prepared overlay, which must match the probed frame
    let (data, content_type) = store.object("video/abc.mp4").unwrap();
    assert_eq!(content_type, "video/mp4");
    let frame = image::load_from_memory(&data).unwrap();
    assert_eq!(frame.dimensions(), (640, 480));

    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_compositor_failure_leaves_message_unacknowledged() {
    let scratch = tempfile::tempdir().unwrap();
    let queue = Arc::new(MemoryQueue::new(5));
    let store = Arc::new(staged_store());
    let executor = executor(&queue, &store, sh_compositor(scratch.path(), FAILING_COMPOSITOR));

    let delivery = queue.push(JOB_WITH_OVERLAY);
    let outcome = executor.process_next().await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::Retrying { attempts: 1 });
    assert!(queue.acked().is_empty());
    assert!(queue.dead_letters().is_empty());
    assert_eq!(queue.failures(&delivery.handle), 1);
    assert!(store.writes().is_empty());
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_missing_source_is_retried() {
    let queue = Arc::new(MemoryQueue::new(5));
    let store = Arc::new(MemoryStore::default());
    let executor = executor(&queue, &store, Arc::new(CountingCompositor::default()));

    queue.push(JOB_WITHOUT_OVERLAY);
    let outcome = executor.process_next().await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::Retrying { attempts: 1 });
    assert!(queue.acked().is_empty());
}

#[tokio::test]
async fn test_upload_failure_is_not_acknowledged() {
    let queue = Arc::new(MemoryQueue::new(5));
    let store = Arc::new(staged_store().failing_writes());
    let executor = executor(&queue, &store, Arc::new(CountingCompositor::default()));

    queue.push(JOB_WITHOUT_OVERLAY);
    let outcome = executor.process_next().await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::Retrying { attempts: 1 });
    assert!(queue.acked().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_is_dead_lettered() {
    let queue = Arc::new(MemoryQueue::new(5));
    let store = Arc::new(staged_store());
    let executor = executor(&queue, &store, Arc::new(CountingCompositor::default()));

    let delivery = queue.push(b"definitely not json");
    let outcome = executor.process_next().await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::DeadLettered);
    assert_eq!(queue.failures(&delivery.handle), 0);

    let dead = queue.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].0.payload, b"definitely not json");
    assert!(dead[0].1.starts_with("Malformed job"));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_dead_letter_after_max_deliveries() {
    let queue = Arc::new(MemoryQueue::new(2));
    let store = Arc::new(MemoryStore::default());
    let executor = executor(&queue, &store, Arc::new(CountingCompositor::default()));

    let delivery = queue.push(JOB_WITHOUT_OVERLAY);
    assert_eq!(
        executor.process_next().await.unwrap(),
        DeliveryOutcome::Retrying { attempts: 1 }
    );

    queue.redeliver(delivery.clone());
    assert_eq!(
        executor.process_next().await.unwrap(),
        DeliveryOutcome::DeadLettered
    );

    assert_eq!(queue.dead_letters().len(), 1);
    assert_eq!(queue.acked(), vec![delivery.handle]);
}

#[tokio::test]
async fn test_unrecorded_failure_is_unsettled() {
    let queue = Arc::new(MemoryQueue::new(5).failing_record());
    let store = Arc::new(MemoryStore::default());
    let executor = executor(&queue, &store, Arc::new(CountingCompositor::default()));

    queue.push(JOB_WITHOUT_OVERLAY);
    let outcome = executor.process_next().await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::Unsettled);
    assert!(queue.acked().is_empty());
    assert!(queue.dead_letters().is_empty());
}

#[tokio::test]
async fn test_redelivery_writes_same_path() {
    let queue = Arc::new(MemoryQueue::new(5));
    let store = Arc::new(staged_store());
    let executor = executor(&queue, &store, Arc::new(CountingCompositor::default()));

    let delivery = queue.push(JOB_WITH_OVERLAY);
    queue.redeliver(delivery);

    assert_eq!(executor.process_next().await.unwrap(), DeliveryOutcome::Acknowledged);
    assert_eq!(executor.process_next().await.unwrap(), DeliveryOutcome::Acknowledged);

    assert_eq!(store.writes(), vec!["video/abc.mp4", "video/abc.mp4"]);
}

#[tokio::test]
async fn test_panic_is_isolated_to_one_delivery() {
    let queue = Arc::new(MemoryQueue::new(5));
    let store = Arc::new(staged_store());
    let executor = executor(&queue, &store, Arc::new(PanickingCompositor));

    let first = queue.push(JOB_WITH_OVERLAY);
    let second = queue.push(JOB_WITHOUT_OVERLAY);

    assert_eq!(
        executor.process_next().await.unwrap(),
        DeliveryOutcome::Retrying { attempts: 1 }
    );
    assert_eq!(queue.failures(&first.handle), 1);

    assert_eq!(executor.process_next().await.unwrap(), DeliveryOutcome::Acknowledged);
    assert_eq!(queue.acked(), vec![second.handle]);
}

#[tokio::test]
async fn test_run_processes_until_shutdown() {
    let queue = Arc::new(MemoryQueue::new(5));
    let store = Arc::new(staged_store());
    let executor = Arc::new(executor(
        &queue,
        &store,
        Arc::new(CountingCompositor::default()),
    ));

    queue.push(b"garbage");
    queue.push(JOB_WITH_OVERLAY);
    queue.push(JOB_WITHOUT_OVERLAY);

    let running = tokio::spawn({
        let executor = executor.clone();
        async move { executor.run().await }
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.acked().len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("all deliveries settled");

    executor.shutdown();
    let result = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("executor stopped")
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(queue.dead_letters().len(), 1);
    assert_eq!(store.writes().len(), 2);
}

#[tokio::test]
async fn test_shutdown_before_run_is_honoured() {
    let queue = Arc::new(MemoryQueue::new(5));
    let store = Arc::new(staged_store());
    let executor = executor(&queue, &store, Arc::new(CountingCompositor::default()));

    executor.shutdown();
    queue.push(JOB_WITHOUT_OVERLAY);

    let result = tokio::time::timeout(Duration::from_secs(2), executor.run())
        .await
        .expect("run returns after an earlier shutdown");

    assert!(result.is_ok());
    assert!(queue.acked().is_empty());
    assert!(store.writes().is_empty());
}
