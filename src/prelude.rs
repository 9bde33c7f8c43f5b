//! Convenient re-exports for common types and traits

pub use crate::core::{
    BoxedJob, CancellationReason, CancellationToken, Cancelled, ClosureJob, Job, PoolError, Result,
};
pub use crate::limiter::TokenBucket;
pub use crate::pool::{DispatcherStats, PoolConfig, WorkerPool, WorkerStats};
