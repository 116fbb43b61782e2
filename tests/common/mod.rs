#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Condvar, Mutex};

use batch_image_optimizer::processing::TransformOutput;
use batch_image_optimizer::utils::derived_file_name;
use batch_image_optimizer::{
    BatchProcessor, Configuration, Finalizer, ImageStore, ImageTransform, OptimizerError,
    OptimizerResult, OutputFormat, PoolSettings, ProcessedImage, RawImage, SettingsHandle,
    TransformError,
};

/// Blocks worker threads until opened.
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn open(&self) {
        let (open, cvar) = &*self.0;
        *open.lock() = true;
        cvar.notify_all();
    }

    pub fn wait(&self) {
        let (open, cvar) = &*self.0;
        let mut open = open.lock();
        while !*open {
            cvar.wait(&mut open);
        }
    }
}

/// Transform that echoes its input and records how it was driven.
#[derive(Default)]
pub struct MockTransform {
    pub inits: AtomicUsize,
    pub releases: AtomicUsize,
    pub started: AtomicUsize,
    active: AtomicUsize,
    pub peak: AtomicUsize,
    pub formats_seen: Mutex<Vec<OutputFormat>>,
    fail_on: HashSet<String>,
    panic_on: HashSet<String>,
    fail_init: Option<usize>,
    delay: Duration,
    gated: Option<(String, Gate)>,
}

impl MockTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, name: &str) -> Self {
        self.fail_on.insert(name.to_string());
        self
    }

    pub fn panic_on(mut self, name: &str) -> Self {
        self.panic_on.insert(name.to_string());
        self
    }

    pub fn fail_init(mut self, context: usize) -> Self {
        self.fail_init = Some(context);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn gate(mut self, name: &str, gate: &Gate) -> Self {
        self.gated = Some((name.to_string(), gate.clone()));
        self
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl ImageTransform for MockTransform {
    fn init_context(&self, context: usize) -> Result<(), TransformError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if self.fail_init == Some(context) {
            return Err(TransformError::init("codec unavailable"));
        }
        Ok(())
    }

    fn release_context(&self, _context: usize) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn transform(
        &self,
        name: &str,
        input: &[u8],
        config: &Configuration,
    ) -> Result<TransformOutput, TransformError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        self.formats_seen.lock().push(config.export.format);

        if let Some((gated, gate)) = &self.gated {
            if gated == name {
                gate.wait();
            }
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on.contains(name) {
            panic!("corrupt scanline in {name}");
        }
        if self.fail_on.contains(name) {
            return Err(TransformError::transform(format!("cannot decode {name}")));
        }

        Ok(TransformOutput {
            data: input[..input.len() / 2].to_vec(),
            mime_type: config.export.format.mime_type().to_string(),
            file_name: derived_file_name(name, config.export.format),
        })
    }
}

/// Finalizer that keeps every batch it receives.
#[derive(Default)]
pub struct RecordingFinalizer {
    pub batches: Mutex<Vec<Vec<ProcessedImage>>>,
    fail: bool,
}

impl RecordingFinalizer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<Vec<ProcessedImage>> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl Finalizer for RecordingFinalizer {
    async fn finalize(&self, images: &[ProcessedImage]) -> OptimizerResult<()> {
        if self.fail {
            return Err(OptimizerError::io("disk full"));
        }
        self.batches.lock().push(images.to_vec());
        Ok(())
    }
}

pub struct Harness {
    pub processor: Arc<BatchProcessor>,
    pub store: Arc<ImageStore>,
    pub transform: Arc<MockTransform>,
    pub finalizer: Arc<RecordingFinalizer>,
}

pub fn harness(transform: MockTransform, finalizer: RecordingFinalizer, pool: PoolSettings) -> Harness {
    let store = Arc::new(ImageStore::new());
    let transform = Arc::new(transform);
    let finalizer = Arc::new(finalizer);
    let settings = Arc::new(SettingsHandle::new(Configuration::default()).unwrap());

    let processor = Arc::new(BatchProcessor::new(
        Arc::clone(&store),
        Arc::clone(&transform) as Arc<dyn ImageTransform>,
        Arc::clone(&finalizer) as Arc<dyn Finalizer>,
        settings,
        pool,
    ));

    Harness {
        processor,
        store,
        transform,
        finalizer,
    }
}

pub fn cores(max_workers: usize) -> PoolSettings {
    PoolSettings {
        max_workers: Some(max_workers),
        ..PoolSettings::default()
    }
}

/// `image-0.png`, `image-1.png`, ...
pub fn images(count: usize) -> Vec<RawImage> {
    (0..count)
        .map(|i| RawImage::from_bytes(format!("image-{i}.png"), vec![i as u8; 64]))
        .collect()
}

/// Polls `condition` until it holds, panicking after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
