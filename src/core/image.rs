//! Image identities and the lifecycle of a single image entry.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::Serialize;
use uuid::Uuid;

/// Opaque identity of one image, generated once at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where the raw bytes of an image come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Bytes already held in memory
    Memory(Arc<[u8]>),
    /// A file read by the worker context when the item runs
    File(PathBuf),
}

/// A dropped image that has not been processed yet.
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Original file name, used to derive the output name
    pub name: String,
    pub source: ImageSource,
}

impl RawImage {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            source: ImageSource::Memory(bytes.into()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Self {
            name,
            source: ImageSource::File(path.to_path_buf()),
        }
    }

    /// Loads the raw bytes. Memory sources are shared, not copied.
    pub fn read(&self) -> io::Result<Arc<[u8]>> {
        match &self.source {
            ImageSource::Memory(bytes) => Ok(Arc::clone(bytes)),
            ImageSource::File(path) => std::fs::read(path).map(Arc::from),
        }
    }
}

/// Result of a successful transformation, keyed by the identity it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedImage {
    pub id: ImageId,
    /// Derived output file name
    pub name: String,
    #[serde(skip)]
    pub data: Arc<[u8]>,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Input size in bytes
    #[serde(rename = "originalSize")]
    pub original_size: u64,
    /// Output size in bytes
    #[serde(rename = "processedSize")]
    pub processed_size: u64,
}

impl ProcessedImage {
    /// Bytes saved (can be negative if the file grew)
    pub fn saved_bytes(&self) -> i64 {
        self.original_size as i64 - self.processed_size as i64
    }

    /// Compression ratio as a percentage
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size > 0 {
            self.saved_bytes() as f64 / self.original_size as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// Current value of one image in the shared state.
///
/// `Pending` becomes `Processed` exactly once and never goes back.
#[derive(Debug, Clone)]
pub enum ImageEntry {
    Pending(RawImage),
    Processed(ProcessedImage),
}

impl ImageEntry {
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Pending(raw) => &raw.name,
            Self::Processed(processed) => &processed.name,
        }
    }
}
