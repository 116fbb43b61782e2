use serde::Serialize;
use crate::utils::ErrorRecord;

/// Where the current batch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum BatchStatus {
    Idle,
    Preparing,
    PoolCreating,
    Running,
    /// Waits here until the success is acknowledged
    Succeeded { processed: usize },
    /// Published just before the state is cleared and reset to `Idle`
    Failed,
}

impl BatchStatus {
    /// Whether a batch currently owns the shared state
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Preparing | Self::PoolCreating | Self::Running)
    }
}

/// Read-only projection of the shared image state for observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Number of entries in the store
    pub total: usize,
    /// Number of entries already processed
    pub processed: usize,
    /// True while a batch is preparing, creating its pool or running
    pub in_flight: bool,
    pub status: BatchStatus,
    pub error: Option<ErrorRecord>,
}

impl StoreSnapshot {
    pub fn empty() -> Self {
        Self {
            total: 0,
            processed: 0,
            in_flight: false,
            status: BatchStatus::Idle,
            error: None,
        }
    }

    /// Progress percentage (0-100)
    pub fn progress_percentage(&self) -> usize {
        if self.total > 0 {
            (self.processed * 100) / self.total
        } else {
            0
        }
    }
}

/// Outcome of one `run_batch` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Number of images processed by this batch
    pub processed: usize,
    /// Workers used, `None` when there was nothing to process
    pub pool_size: Option<usize>,
    pub original_bytes: u64,
    pub processed_bytes: u64,
}

impl BatchSummary {
    pub fn empty() -> Self {
        Self {
            processed: 0,
            pool_size: None,
            original_bytes: 0,
            processed_bytes: 0,
        }
    }

    /// Bytes saved (can be negative if the batch grew)
    pub fn saved_bytes(&self) -> i64 {
        self.original_bytes as i64 - self.processed_bytes as i64
    }
}
