//! Pool sizing policy.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Number of workers for a batch of `batch_size` images.
///
/// Half the batch, rounded up, capped at `max_cores` and never below one.
pub fn pool_size(batch_size: usize, max_cores: usize) -> usize {
    batch_size.div_ceil(2).min(max_cores).max(1)
}

/// Tunables for worker pools.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolSettings {
    /// Hard cap on workers, overrides hardware detection
    pub max_workers: Option<usize>,
    /// Cores left free for the rest of the system
    pub reserved_cores: usize,
    /// Fails the batch when a single item runs longer than this
    pub item_timeout_ms: Option<u64>,
}

impl PoolSettings {
    /// Upper bound for [`pool_size`], at least 1.
    pub fn max_cores(&self) -> usize {
        self.max_workers
            .unwrap_or_else(|| num_cpus::get().saturating_sub(self.reserved_cores))
            .max(1)
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_ms.map(Duration::from_millis)
    }
}
