//! Worker pool and its sizing policy.

mod pool;
mod sizing;
mod task;

pub use pool::WorkerPool;
pub use sizing::{PoolSettings, pool_size};
pub use task::WorkItem;
