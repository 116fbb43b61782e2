//! Result consumption for successful batches.

mod archive;

pub use archive::{ArchiveFinalizer, archive_name, build_archive};

use async_trait::async_trait;
use crate::core::ProcessedImage;
use crate::utils::OptimizerResult;

/// Receives the processed images of a successful batch, in ingestion order.
///
/// A failure here still fails the batch as a whole.
#[async_trait]
pub trait Finalizer: Send + Sync {
    async fn finalize(&self, images: &[ProcessedImage]) -> OptimizerResult<()>;
}
