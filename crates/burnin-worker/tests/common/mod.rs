//! In-memory doubles for the worker's seams.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use burnin_media::{Compositor, ExternalTool, MediaResult};
use burnin_models::StoragePath;
use burnin_queue::{Delivery, MessageHandle, MessageQueue, QueueError, QueueResult};
use burnin_storage::{ObjectStore, StorageError, StorageResult};

/// Object store backed by a map.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    writes: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn with_object(self, path: &str, data: &[u8]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (data.to_vec(), "application/octet-stream".to_string()));
        self
    }

    pub fn failing_writes(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    pub fn object(&self, path: &str) -> Option<(Vec<u8>, String)> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn read(&self, path: &StoragePath) -> StorageResult<Vec<u8>> {
        self.object(path.as_str())
            .map(|(data, _)| data)
            .ok_or_else(|| StorageError::not_found(path.as_str()))
    }

    async fn write(
        &self,
        path: &StoragePath,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::upload_failed("connection reset"));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (data, content_type.to_string()));
        self.writes.lock().unwrap().push(path.to_string());
        Ok(format!("memory://{}", path))
    }
}

/// Queue double recording how each delivery was settled.
///
/// Redelivery is simulated by pushing the same delivery again.
pub struct MemoryQueue {
    pending: Mutex<VecDeque<Delivery>>,
    acked: Mutex<Vec<MessageHandle>>,
    dead: Mutex<Vec<(Delivery, String)>>,
    failures: Mutex<HashMap<MessageHandle, u32>>,
    max_deliveries: u32,
    fail_record: AtomicBool,
    next_id: AtomicUsize,
}

impl MemoryQueue {
    pub fn new(max_deliveries: u32) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            acked: Mutex::new(Vec::new()),
            dead: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            max_deliveries,
            fail_record: AtomicBool::new(false),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn failing_record(self) -> Self {
        self.fail_record.store(true, Ordering::SeqCst);
        self
    }

    /// Enqueue a new message and return its delivery.
    pub fn push(&self, payload: &[u8]) -> Delivery {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let delivery = Delivery::new(MessageHandle::new(format!("{}-0", id)), payload.to_vec());
        self.redeliver(delivery.clone());
        delivery
    }

    pub fn redeliver(&self, delivery: Delivery) {
        self.pending.lock().unwrap().push_back(delivery);
    }

    pub fn acked(&self) -> Vec<MessageHandle> {
        self.acked.lock().unwrap().clone()
    }

    pub fn dead_letters(&self) -> Vec<(Delivery, String)> {
        self.dead.lock().unwrap().clone()
    }

    pub fn failures(&self, handle: &MessageHandle) -> u32 {
        self.failures.lock().unwrap().get(handle).copied().unwrap_or(0)
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn pull(&self) -> QueueResult<Delivery> {
        let next = self.pending.lock().unwrap().pop_front();
        match next {
            Some(delivery) => Ok(delivery),
            None => std::future::pending().await,
        }
    }

    async fn ack(&self, handle: &MessageHandle) -> QueueResult<()> {
        self.acked.lock().unwrap().push(handle.clone());
        Ok(())
    }

    async fn record_failure(&self, handle: &MessageHandle) -> QueueResult<u32> {
        if self.fail_record.load(Ordering::SeqCst) {
            return Err(QueueError::connection_failed("redis went away"));
        }
        let mut failures = self.failures.lock().unwrap();
        let count = failures.entry(handle.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()> {
        self.dead
            .lock()
            .unwrap()
            .push((delivery.clone(), reason.to_string()));
        self.ack(&delivery.handle).await
    }

    fn max_deliveries(&self) -> u32 {
        self.max_deliveries
    }
}

/// Compositor that counts calls and returns fixed bytes.
#[derive(Default)]
pub struct CountingCompositor {
    calls: AtomicUsize,
}

impl CountingCompositor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Compositor for CountingCompositor {
    async fn composite(&self, _video: &[u8], _overlay: &[u8]) -> MediaResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(b"composited".to_vec())
    }
}

/// Compositor that panics.
pub struct PanickingCompositor;

#[async_trait]
impl Compositor for PanickingCompositor {
    async fn composite(&self, _video: &[u8], _overlay: &[u8]) -> MediaResult<Vec<u8>> {
        panic!("compositor bug");
    }
}

/// A `/bin/sh` script standing in for an external tool; call arguments
/// become `$1...`.
pub fn sh(script: &str) -> ExternalTool {
    ExternalTool::new("/bin/sh")
        .with_arg("-c")
        .with_arg(script)
        .with_arg("sh")
}

/// Probe printing an FFprobe-style stream line for a 640x480 video.
pub const FAKE_PROBE: &str =
    "echo 'Stream #0:0(und): Video: h264 (High) (avc1 / 0x31637661), yuv420p, 640x480 [SAR 1:1 DAR 4:3]' >&2";

/// Compositor copying its last `-i` input (the prepared overlay) to the output.
pub const FAKE_COMPOSITOR: &str = r#"prev=""; overlay=""; out=""
for a in "$@"; do
  if [ "$prev" = "-i" ]; then overlay="$a"; fi
  prev="$a"; out="$a"
done
cp "$overlay" "$out""#;

/// Compositor failing like a broken encoder.
pub const FAILING_COMPOSITOR: &str = "echo 'encoder exploded' >&2; exit 1";

/// A solid PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([0, 0, 255, 200]),
    ));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

pub const JOB_WITH_OVERLAY: &[u8] =
    br#"{"video": "staging/abc.mp4", "overlay": "staging/ov.png", "content_type": "video/mp4"}"#;

pub const JOB_WITHOUT_OVERLAY: &[u8] =
    br#"{"video": "staging/abc.mp4", "content_type": "video/mp4"}"#;
