//! Image transformation and batch orchestration.

mod transform;
pub mod batch;
pub mod codec;

pub use batch::BatchProcessor;
pub use codec::ImageCodec;
pub use transform::{ImageTransform, Stage, TransformError, TransformOutput};
