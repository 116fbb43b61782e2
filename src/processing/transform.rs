//! The per-item transform seam between the worker pool and the codec.

use std::fmt;
use serde::Serialize;
use thiserror::Error;
use crate::core::Configuration;

/// Pipeline stage an item failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    Init,
    Read,
    Transform,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "INIT",
            Self::Read => "READ",
            Self::Transform => "TRANSFORM",
            Self::Write => "WRITE",
        })
    }
}

/// Typed failure reported by an [`ImageTransform`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage}: {message}")]
pub struct TransformError {
    pub stage: Stage,
    pub message: String,
}

impl TransformError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    pub fn init(message: impl Into<String>) -> Self {
        Self::new(Stage::Init, message)
    }

    pub fn read(message: impl Into<String>) -> Self {
        Self::new(Stage::Read, message)
    }

    pub fn transform(message: impl Into<String>) -> Self {
        Self::new(Stage::Transform, message)
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::new(Stage::Write, message)
    }
}

/// Encoded output of one transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub data: Vec<u8>,
    pub mime_type: String,
    /// Output name derived from the input name and the export format
    pub file_name: String,
}

/// Opaque per-item image transformation.
///
/// Called on worker threads, so implementations may block and burn CPU freely.
/// A panic is contained to the item that caused it.
pub trait ImageTransform: Send + Sync + 'static {
    /// Prepares a worker context before it accepts work.
    ///
    /// Expensive one-time setup should be cached for the process lifetime, as
    /// every pool calls this once per context. A failure aborts pool creation.
    fn init_context(&self, _context: usize) -> Result<(), TransformError> {
        Ok(())
    }

    /// Called once when a worker context shuts down.
    fn release_context(&self, _context: usize) {}

    fn transform(
        &self,
        name: &str,
        input: &[u8],
        config: &Configuration,
    ) -> Result<TransformOutput, TransformError>;
}
