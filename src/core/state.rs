//! Shared image state.
//!
//! [`ImageStore`] is the single source of truth for a batch: an ordered map from
//! [`ImageId`] to [`ImageEntry`] plus the batch status and the last error. Only
//! the batch processor mutates it (the mutators are crate-private); observers read
//! snapshots or subscribe to a `watch` channel that is refreshed after every write.

use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::core::image::{ImageEntry, ImageId, ProcessedImage, RawImage};
use crate::core::progress::{BatchStatus, StoreSnapshot};
use crate::utils::ErrorRecord;

struct StoreInner {
    images: IndexMap<ImageId, ImageEntry>,
    status: BatchStatus,
    error: Option<ErrorRecord>,
}

impl StoreInner {
    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            total: self.images.len(),
            processed: self.images.values().filter(|e| e.is_processed()).count(),
            in_flight: self.status.is_active(),
            status: self.status,
            error: self.error.clone(),
        }
    }
}

pub struct ImageStore {
    inner: RwLock<StoreInner>,
    updates: watch::Sender<StoreSnapshot>,
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageStore {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(StoreSnapshot::empty());
        Self {
            inner: RwLock::new(StoreInner {
                images: IndexMap::new(),
                status: BatchStatus::Idle,
                error: None,
            }),
            updates,
        }
    }

    // Observer API

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.read().snapshot()
    }

    /// Receives a fresh snapshot after every change to the store.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.updates.subscribe()
    }

    pub fn len(&self) -> usize {
        self.inner.read().images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().images.is_empty()
    }

    pub fn get(&self, id: &ImageId) -> Option<ImageEntry> {
        self.inner.read().images.get(id).cloned()
    }

    /// All identities in ingestion order
    pub fn ids(&self) -> Vec<ImageId> {
        self.inner.read().images.keys().copied().collect()
    }

    /// Processed entries in ingestion order
    pub fn processed_images(&self) -> Vec<ProcessedImage> {
        self.inner
            .read()
            .images
            .values()
            .filter_map(|entry| match entry {
                ImageEntry::Processed(p) => Some(p.clone()),
                ImageEntry::Pending(_) => None,
            })
            .collect()
    }

    pub fn status(&self) -> BatchStatus {
        self.inner.read().status
    }

    pub fn error(&self) -> Option<ErrorRecord> {
        self.inner.read().error.clone()
    }

    // Mutations, batch processor only

    fn publish(&self, inner: &StoreInner) {
        self.updates.send_replace(inner.snapshot());
    }

    /// Adds every image as `Pending` under a fresh identity.
    pub(crate) fn insert_pending(&self, images: Vec<RawImage>) -> Vec<ImageId> {
        let mut inner = self.inner.write();
        let ids = images
            .into_iter()
            .map(|raw| {
                let id = ImageId::new();
                inner.images.insert(id, ImageEntry::Pending(raw));
                id
            })
            .collect();
        self.publish(&inner);
        ids
    }

    /// Pending entries in ingestion order
    pub(crate) fn pending(&self) -> Vec<(ImageId, RawImage)> {
        self.inner
            .read()
            .images
            .iter()
            .filter_map(|(id, entry)| match entry {
                ImageEntry::Pending(raw) => Some((*id, raw.clone())),
                ImageEntry::Processed(_) => None,
            })
            .collect()
    }

    /// Moves the matching entry from `Pending` to `Processed`.
    ///
    /// Returns `false` and leaves the store untouched when the identity is unknown
    /// (e.g. the store was cleared) or the entry was already processed.
    pub(crate) fn mark_processed(&self, image: ProcessedImage) -> bool {
        let mut inner = self.inner.write();
        let Some(entry) = inner.images.get_mut(&image.id) else {
            debug!("Discarding result for unknown image {}", image.id);
            return false;
        };

        if entry.is_processed() {
            debug!("Image {} already processed, ignoring duplicate result", image.id);
            return false;
        }

        *entry = ImageEntry::Processed(image);
        self.publish(&inner);
        true
    }

    /// Processed entries for `ids`, in the order given
    pub(crate) fn processed_for(&self, ids: &[ImageId]) -> Vec<ProcessedImage> {
        let inner = self.inner.read();
        ids.iter()
            .filter_map(|id| match inner.images.get(id) {
                Some(ImageEntry::Processed(p)) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn set_status(&self, status: BatchStatus) {
        let mut inner = self.inner.write();
        inner.status = status;
        self.publish(&inner);
    }

    /// Rolls back a failed batch: every entry is dropped and the error surfaced.
    pub(crate) fn fail(&self, record: ErrorRecord) {
        let mut inner = self.inner.write();
        inner.images.clear();
        inner.error = Some(record);
        inner.status = BatchStatus::Failed;
        self.publish(&inner);

        inner.status = BatchStatus::Idle;
        self.publish(&inner);
    }

    /// Drops every entry and returns to `Idle`.
    pub(crate) fn reset(&self) {
        let mut inner = self.inner.write();
        inner.images.clear();
        inner.status = BatchStatus::Idle;
        self.publish(&inner);
    }

    pub(crate) fn clear_error(&self) {
        let mut inner = self.inner.write();
        if inner.error.take().is_some() {
            self.publish(&inner);
        }
    }
}
