// Module declarations in dependency order
pub mod utils;
pub mod core;
pub mod processing;
pub mod worker;
pub mod export;

// Public exports for external consumers
pub use crate::core::{
    BatchStatus, BatchSummary, Configuration, ImageEntry, ImageId, ImageStore, JsonFileStore,
    KeyValueStore, ProcessedImage, RawImage, SettingsHandle, StoreSnapshot,
};
pub use export::{ArchiveFinalizer, Finalizer};
pub use processing::{BatchProcessor, ImageCodec, ImageTransform, Stage, TransformError, TransformOutput};
pub use utils::{ErrorRecord, OptimizerError, OptimizerResult, OutputFormat};
pub use worker::{PoolSettings, WorkItem, WorkerPool, pool_size};
