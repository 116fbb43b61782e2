//! Error types for the image optimizer.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.
//! Every item-level failure is promoted to a batch-level [`OptimizerError`]; the
//! user-facing [`ErrorRecord`] is derived from whichever error ended the batch.

use std::io;
use std::time::Duration;
use serde::Serialize;
use thiserror::Error;

use crate::processing::Stage;

/// Main error type for the optimizer pipeline.
#[derive(Error, Debug, Clone, Serialize)]
pub enum OptimizerError {
    /// A worker context failed to start; the batch never ran
    #[error("Pool creation failed: {0}")]
    PoolCreation(String),

    /// Raw bytes could not be obtained from an input source
    #[error("Failed to read '{name}': {message}")]
    ItemRead { name: String, message: String },

    /// The codec rejected an item during init, decode, resize or encode
    #[error("Failed to process '{name}' ({stage}): {message}")]
    ItemTransform {
        name: String,
        stage: Stage,
        message: String,
    },

    /// An item exceeded the configured per-item timeout
    #[error("Processing '{name}' timed out after {after:?}")]
    ItemTimeout { name: String, after: Duration },

    /// The export step failed after every item succeeded
    #[error("Export failed: {0}")]
    Aggregation(String),

    /// Configuration or input validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Another batch owns the shared state
    #[error("A batch is already being processed")]
    BatchInProgress,

    /// The caller dropped `run_batch` before it finished
    #[error("Batch was cancelled before it finished")]
    BatchCancelled,

    /// File IO error outside of a single item
    #[error("IO error: {0}")]
    IO(String),
}

/// Convenience result type for optimizer operations.
pub type OptimizerResult<T> = Result<T, OptimizerError>;

// Helper methods for error creation
impl OptimizerError {
    pub fn pool_creation<T: Into<String>>(msg: T) -> Self {
        Self::PoolCreation(msg.into())
    }

    pub fn item_read(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ItemRead {
            name: name.into(),
            message: msg.into(),
        }
    }

    pub fn item_transform(name: impl Into<String>, stage: Stage, msg: impl Into<String>) -> Self {
        Self::ItemTransform {
            name: name.into(),
            stage,
            message: msg.into(),
        }
    }

    pub fn aggregation<T: Into<String>>(msg: T) -> Self {
        Self::Aggregation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn io<T: Into<String>>(msg: T) -> Self {
        Self::IO(msg.into())
    }

    /// Pipeline stage the failure belongs to, when it is tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::ItemRead { .. } => Some(Stage::Read),
            Self::ItemTransform { stage, .. } => Some(*stage),
            Self::PoolCreation(_) => Some(Stage::Init),
            _ => None,
        }
    }
}

// Convert std::io::Error to OptimizerError
impl From<io::Error> for OptimizerError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

/// Batch-level error surfaced to observers.
///
/// Not tied to a specific item once surfaced: `message` is meant for people,
/// `cause` carries the technical detail of the error that ended the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub cause: Option<String>,
    pub stage: Option<Stage>,
}

impl From<&OptimizerError> for ErrorRecord {
    fn from(err: &OptimizerError) -> Self {
        let message = match err {
            OptimizerError::PoolCreation(_) => "Could not start the image workers.",
            OptimizerError::ItemRead { .. } => "One of the images could not be read.",
            OptimizerError::ItemTransform { .. } => "One of the images could not be processed.",
            OptimizerError::ItemTimeout { .. } => "Processing an image took too long.",
            OptimizerError::Aggregation(_) => "The processed images could not be exported.",
            OptimizerError::Validation(_) => "The current settings are invalid.",
            OptimizerError::BatchInProgress => "Images are already being processed.",
            OptimizerError::BatchCancelled => "Processing was cancelled.",
            OptimizerError::IO(_) => "A file system error occurred.",
        };

        let cause = match err {
            OptimizerError::BatchInProgress => None,
            other => Some(other.to_string()),
        };

        Self {
            message: message.to_string(),
            cause,
            stage: err.stage(),
        }
    }
}

impl From<OptimizerError> for ErrorRecord {
    fn from(err: OptimizerError) -> Self {
        Self::from(&err)
    }
}
