//! Fixed-size pool of isolated worker contexts.
//!
//! Every context is an OS thread with its own job channel. The pool hands each
//! submission to the least-loaded context; jobs queue FIFO per context. A
//! transform panic is caught per item, so one bad image never takes a context
//! (or its siblings) down with it.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use futures::future::join_all;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::core::ProcessedImage;
use crate::processing::{ImageTransform, Stage, TransformError};
use crate::utils::{OptimizerError, OptimizerResult};
use crate::worker::WorkItem;

type Reply = oneshot::Sender<OptimizerResult<ProcessedImage>>;

struct Job {
    item: WorkItem,
    reply: Reply,
}

struct WorkerContext {
    id: usize,
    sender: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
    /// Jobs sent to this context that have not finished yet
    queued: Arc<AtomicUsize>,
}

pub struct WorkerPool {
    contexts: Vec<WorkerContext>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `size` worker contexts and waits until each one is initialized.
    ///
    /// Fails with [`OptimizerError::PoolCreation`] if any context cannot be
    /// started or initialized; contexts that did start are torn down first.
    pub async fn create(size: usize, transform: Arc<dyn ImageTransform>) -> OptimizerResult<Self> {
        if size == 0 {
            return Err(OptimizerError::pool_creation("pool size must be at least 1"));
        }

        debug!("Creating worker pool with {} contexts", size);
        let mut pool = Self {
            contexts: Vec::with_capacity(size),
            shutdown: Arc::new(AtomicBool::new(false)),
        };
        let mut ready = Vec::with_capacity(size);

        for id in 0..size {
            let (sender, jobs) = unbounded::<Job>();
            let (ready_tx, ready_rx) = oneshot::channel();
            let queued = Arc::new(AtomicUsize::new(0));

            let spawned = thread::Builder::new()
                .name(format!("image-worker-{id}"))
                .spawn({
                    let transform = Arc::clone(&transform);
                    let shutdown = Arc::clone(&pool.shutdown);
                    let queued = Arc::clone(&queued);
                    move || run_context(id, jobs, ready_tx, transform, shutdown, queued)
                });

            match spawned {
                Ok(handle) => {
                    pool.contexts.push(WorkerContext {
                        id,
                        sender: Some(sender),
                        handle: Some(handle),
                        queued,
                    });
                    ready.push(ready_rx);
                }
                Err(e) => {
                    warn!("Failed to spawn worker {}: {}", id, e);
                    pool.destroy().await;
                    return Err(OptimizerError::pool_creation(format!(
                        "cannot spawn worker {id}: {e}"
                    )));
                }
            }
        }

        let mut failure = None;
        for (id, outcome) in join_all(ready).await.into_iter().enumerate() {
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("worker {id} failed to initialize: {e}"),
                Err(_) => format!("worker {id} exited during initialization"),
            };
            warn!("{}", error);
            failure.get_or_insert(error);
        }

        if let Some(error) = failure {
            pool.destroy().await;
            return Err(OptimizerError::pool_creation(error));
        }

        info!("Worker pool ready with {} contexts", size);
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.contexts.len()
    }

    /// Jobs submitted but not finished, across all contexts
    pub fn queued(&self) -> usize {
        self.contexts
            .iter()
            .map(|c| c.queued.load(Ordering::Acquire))
            .sum()
    }

    /// Runs `item` on the least-loaded context and waits for its result.
    ///
    /// Safe to call concurrently. Dropping the returned future abandons the
    /// item: the context skips it if it has not started, or discards the result.
    pub async fn execute(&self, item: WorkItem) -> OptimizerResult<ProcessedImage> {
        let name = item.name().to_string();
        let context = self
            .contexts
            .iter()
            .filter(|c| c.sender.is_some())
            .min_by_key(|c| c.queued.load(Ordering::Acquire))
            .ok_or_else(|| {
                OptimizerError::item_transform(&name, Stage::Init, "worker pool is shut down")
            })?;

        let (reply, result) = oneshot::channel();
        context.queued.fetch_add(1, Ordering::AcqRel);

        let sent = context
            .sender
            .as_ref()
            .map(|sender| sender.send(Job { item, reply }).is_ok())
            .unwrap_or(false);
        if !sent {
            context.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(OptimizerError::item_transform(
                &name,
                Stage::Init,
                format!("worker {} is not accepting work", context.id),
            ));
        }

        debug!("Queued '{}' on worker {}", name, context.id);
        result.await.map_err(|_| {
            OptimizerError::item_transform(
                &name,
                Stage::Transform,
                format!("worker {} stopped before finishing the item", context.id),
            )
        })?
    }

    /// Shuts every context down and waits for the threads to exit.
    ///
    /// Jobs that have not started are dropped. A context that is mid-item
    /// finishes it and its result is discarded.
    pub async fn destroy(mut self) {
        let handles = self.shutdown_contexts();
        let count = handles.len();

        let joined = tokio::task::spawn_blocking(move || {
            for handle in handles {
                if handle.join().is_err() {
                    warn!("Worker thread panicked during shutdown");
                }
            }
        })
        .await;

        if let Err(e) = joined {
            warn!("Worker pool teardown failed: {}", e);
        }
        debug!("Worker pool destroyed ({} contexts)", count);
    }

    /// Shuts every context down without waiting for busy ones.
    ///
    /// Unstarted jobs are dropped and the threads are joined in the background.
    /// A context that is mid-item finishes it and its result is discarded.
    pub fn abandon(mut self) {
        let handles = self.shutdown_contexts();
        if handles.is_empty() {
            return;
        }

        let count = handles.len();
        let reaper = thread::Builder::new()
            .name("image-worker-reaper".to_string())
            .spawn(move || {
                for handle in handles {
                    if handle.join().is_err() {
                        warn!("Worker thread panicked during shutdown");
                    }
                }
                debug!("Abandoned worker pool finished ({} contexts)", count);
            });

        if let Err(e) = reaper {
            warn!("Cannot join abandoned workers, detaching them: {}", e);
        }
    }

    fn shutdown_contexts(&mut self) -> Vec<JoinHandle<()>> {
        self.shutdown.store(true, Ordering::Release);
        self.contexts
            .iter_mut()
            .filter_map(|context| {
                // Closing the channel ends the context's receive loop
                context.sender.take();
                context.handle.take()
            })
            .collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let detached = self.shutdown_contexts();
        if !detached.is_empty() {
            debug!("Worker pool dropped without destroy, {} contexts detached", detached.len());
        }
    }
}

// Worker context, runs on its own thread

fn run_context(
    id: usize,
    jobs: Receiver<Job>,
    ready: oneshot::Sender<Result<(), TransformError>>,
    transform: Arc<dyn ImageTransform>,
    shutdown: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
) {
    let init = catch_unwind(AssertUnwindSafe(|| transform.init_context(id)))
        .unwrap_or_else(|panic| Err(TransformError::init(panic_message(&*panic))));
    let initialized = init.is_ok();
    let _ = ready.send(init);

    if initialized {
        debug!("Worker {} started", id);
        while let Ok(job) = jobs.recv() {
            if shutdown.load(Ordering::Acquire) || job.reply.is_closed() {
                debug!("Worker {} skipping abandoned item '{}'", id, job.item.name());
                queued.fetch_sub(1, Ordering::AcqRel);
                continue;
            }

            let result = process_item(id, transform.as_ref(), job.item);
            queued.fetch_sub(1, Ordering::AcqRel);

            // The orchestrator may have stopped listening
            let _ = job.reply.send(result);
        }
    }

    transform.release_context(id);
    debug!("Worker {} channel closed, shutting down", id);
}

fn process_item(
    context: usize,
    transform: &dyn ImageTransform,
    item: WorkItem,
) -> OptimizerResult<ProcessedImage> {
    let WorkItem { id, image, config } = item;
    debug!("Worker {} processing '{}'", context, image.name);

    let input = image
        .read()
        .map_err(|e| OptimizerError::item_read(&image.name, e.to_string()))?;

    let output = catch_unwind(AssertUnwindSafe(|| {
        transform.transform(&image.name, &input, &config)
    }))
    .unwrap_or_else(|panic| {
        Err(TransformError::transform(format!(
            "codec panicked: {}",
            panic_message(&*panic)
        )))
    })
    .map_err(|e| match e.stage {
        Stage::Read => OptimizerError::item_read(&image.name, e.message),
        stage => OptimizerError::item_transform(&image.name, stage, e.message),
    })?;

    Ok(ProcessedImage {
        id,
        name: output.file_name,
        original_size: input.len() as u64,
        processed_size: output.data.len() as u64,
        data: Arc::from(output.data),
        mime_type: output.mime_type,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
