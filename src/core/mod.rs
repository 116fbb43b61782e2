//! Core application types and state management.
//!
//! This module contains the fundamental types used throughout the pipeline:
//! - [`ImageStore`]: Shared image state observed by callers
//! - [`ImageEntry`]: Pending or processed value of one image
//! - [`Configuration`]: Settings a work item is transformed with
//! - [`SettingsHandle`]: Current global configuration and its persistence
//! - [`StoreSnapshot`]: Progress projection for observers

mod image;
mod progress;
mod settings;
mod state;
mod types;

pub use image::{ImageEntry, ImageId, ImageSource, ProcessedImage, RawImage};
pub use progress::{BatchStatus, BatchSummary, StoreSnapshot};
pub use settings::{JsonFileStore, KeyValueStore, SettingsHandle};
pub use state::ImageStore;
pub use types::{
    CompressionConfiguration, Configuration, ExportConfiguration, ResizeConfiguration, ResizeMode,
};
