use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::{BatchStatus, BatchSummary, ImageId, ImageStore, ProcessedImage, RawImage, SettingsHandle};
use crate::export::Finalizer;
use crate::processing::ImageTransform;
use crate::utils::{ErrorRecord, OptimizerError, OptimizerResult};
use crate::worker::{PoolSettings, WorkItem, WorkerPool, pool_size};

/// Drives batches of pending images through a fresh worker pool.
///
/// A batch is all-or-nothing: either every item is processed and handed to the
/// [`Finalizer`], or the first failure clears the store and records the error.
pub struct BatchProcessor {
    store: Arc<ImageStore>,
    transform: Arc<dyn ImageTransform>,
    finalizer: Arc<dyn Finalizer>,
    settings: Arc<SettingsHandle>,
    pool_settings: PoolSettings,
    /// Held for the whole of a batch
    running: Mutex<()>,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<ImageStore>,
        transform: Arc<dyn ImageTransform>,
        finalizer: Arc<dyn Finalizer>,
        settings: Arc<SettingsHandle>,
        pool_settings: PoolSettings,
    ) -> Self {
        debug!("Creating BatchProcessor with {:?}", pool_settings);
        Self {
            store,
            transform,
            finalizer,
            settings,
            pool_settings,
            running: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<ImageStore> {
        &self.store
    }

    pub fn settings(&self) -> &Arc<SettingsHandle> {
        &self.settings
    }

    /// Registers new images as pending.
    pub fn add_items(&self, images: Vec<RawImage>) -> OptimizerResult<Vec<ImageId>> {
        let _guard = self.running.try_lock().map_err(|_| OptimizerError::BatchInProgress)?;

        let ids = self.store.insert_pending(images);
        debug!("Added {} images, {} in store", ids.len(), self.store.len());
        Ok(ids)
    }

    /// Processes every pending image as one batch.
    ///
    /// Returns an empty summary without touching the store when nothing is
    /// pending. Fails with [`OptimizerError::BatchInProgress`] if another batch
    /// is running.
    pub async fn run_batch(&self) -> OptimizerResult<BatchSummary> {
        let _guard = self.running.try_lock().map_err(|_| OptimizerError::BatchInProgress)?;

        let pending = self.store.pending();
        if pending.is_empty() {
            debug!("No pending images, nothing to process");
            return Ok(BatchSummary::empty());
        }

        self.store.clear_error();
        self.store.set_status(BatchStatus::Preparing);

        let mut batch = BatchGuard::new(&self.store);
        let result = self.execute_batch(pending).await;
        batch.finish();
        result
    }

    async fn execute_batch(&self, pending: Vec<(ImageId, RawImage)>) -> OptimizerResult<BatchSummary> {
        let config = Arc::new(self.settings.snapshot());
        let ids: Vec<ImageId> = pending.iter().map(|(id, _)| *id).collect();
        let items: Vec<WorkItem> = pending
            .into_iter()
            .map(|(id, image)| WorkItem::new(id, image, Arc::clone(&config)))
            .collect();

        let size = pool_size(items.len(), self.pool_settings.max_cores());
        info!("Processing batch of {} images with {} workers", items.len(), size);

        self.store.set_status(BatchStatus::PoolCreating);
        let pool = match WorkerPool::create(size, Arc::clone(&self.transform)).await {
            Ok(pool) => pool,
            Err(e) => return Err(self.abort(e)),
        };

        self.store.set_status(BatchStatus::Running);
        if let Err(e) = self.process_items(&pool, items).await {
            // Siblings still running finish in the background
            let e = self.abort(e);
            pool.abandon();
            return Err(e);
        }
        pool.destroy().await;

        let processed = self.store.processed_for(&ids);
        if processed.len() != ids.len() {
            let e = OptimizerError::aggregation(format!(
                "{} of {} images missing from the store",
                ids.len() - processed.len(),
                ids.len()
            ));
            return Err(self.abort(e));
        }

        if let Err(e) = self.finalizer.finalize(&processed).await {
            let e = match e {
                OptimizerError::Aggregation(_) => e,
                other => OptimizerError::aggregation(other.to_string()),
            };
            return Err(self.abort(e));
        }

        let summary = BatchSummary {
            processed: processed.len(),
            pool_size: Some(size),
            original_bytes: processed.iter().map(|p| p.original_size).sum(),
            processed_bytes: processed.iter().map(|p| p.processed_size).sum(),
        };
        self.store.set_status(BatchStatus::Succeeded {
            processed: summary.processed,
        });

        info!(
            "Batch completed: {} images, {} bytes saved",
            summary.processed,
            summary.saved_bytes()
        );
        Ok(summary)
    }

    /// Clears a finished batch and returns to idle.
    ///
    /// Does nothing unless the last batch succeeded.
    pub fn acknowledge_success(&self) -> OptimizerResult<()> {
        let _guard = self.running.try_lock().map_err(|_| OptimizerError::BatchInProgress)?;

        if matches!(self.store.status(), BatchStatus::Succeeded { .. }) {
            self.store.reset();
            debug!("Batch success acknowledged");
        }
        Ok(())
    }

    pub fn dismiss_error(&self) {
        self.store.clear_error();
    }

    /// Streams every item through `pool`, writing each result as it arrives.
    ///
    /// Returns on the first failure; dropping the stream abandons the rest.
    async fn process_items(&self, pool: &WorkerPool, items: Vec<WorkItem>) -> OptimizerResult<()> {
        let timeout = self.pool_settings.item_timeout();
        let mut results = stream::iter(items)
            .map(|item| execute_item(pool, item, timeout))
            .buffer_unordered(pool.size());

        while let Some(result) = results.next().await {
            let image = result?;
            debug!("Processed '{}' ({} -> {} bytes)", image.name, image.original_size, image.processed_size);
            self.store.mark_processed(image);
        }
        Ok(())
    }

    fn abort(&self, error: OptimizerError) -> OptimizerError {
        warn!("Batch failed: {}", error);
        self.store.fail(ErrorRecord::from(&error));
        error
    }
}

async fn execute_item(
    pool: &WorkerPool,
    item: WorkItem,
    timeout: Option<Duration>,
) -> OptimizerResult<ProcessedImage> {
    let Some(after) = timeout else {
        return pool.execute(item).await;
    };

    let name = item.name().to_string();
    tokio::time::timeout(after, pool.execute(item))
        .await
        .map_err(|_| OptimizerError::ItemTimeout { name, after })?
}

/// Rolls the store back when a batch future is dropped before it completes.
struct BatchGuard<'a> {
    store: &'a ImageStore,
    finished: bool,
}

impl<'a> BatchGuard<'a> {
    fn new(store: &'a ImageStore) -> Self {
        Self {
            store,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Batch dropped before completion, rolling back");
            self.store.fail(ErrorRecord::from(&OptimizerError::BatchCancelled));
        }
    }
}
