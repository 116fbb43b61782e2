use std::sync::Arc;
use crate::core::{Configuration, ImageId, RawImage};

/// One image submitted to a worker pool.
///
/// `config` is a snapshot taken when the batch was prepared; it is shared by the
/// items of that batch and never observes later settings changes.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: ImageId,
    pub image: RawImage,
    pub config: Arc<Configuration>,
}

impl WorkItem {
    pub fn new(id: ImageId, image: RawImage, config: Arc<Configuration>) -> Self {
        Self { id, image, config }
    }

    pub fn name(&self) -> &str {
        &self.image.name
    }
}
