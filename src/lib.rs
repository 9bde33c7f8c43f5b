//! # Paced Pool
//!
//! A rate-limited, cancellable worker pool: jobs start at a configurable
//! pace no matter how fast they are submitted, and a cancellation signal
//! promptly stops every stage of the pipeline.
//!
//! ## Features
//!
//! - **Rate Limiting**: A token bucket meters job starts per second across
//!   the whole pool, independent of worker count
//! - **Cancellation**: Hierarchical tokens with a waitable done channel;
//!   cancelling unblocks pacing waits, idle workers, and full-queue
//!   submitters without polling
//! - **Bounded Submission**: A fixed-capacity queue backpressures producers
//!   instead of exhausting memory
//! - **Panic Isolation**: A panicking job is counted and logged, and its
//!   worker keeps running
//! - **Graceful Shutdown**: Closing the pool drains accepted jobs through
//!   the limiter before threads are reaped
//! - **Worker Statistics**: Processed, failed, and panicked counts per
//!   worker, valid even after shutdown
//!
//! ## Quick Start
//!
//! ```rust
//! use paced_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! // The pool is running as soon as the constructor returns: 4 workers,
//! // at most 1000 job starts per second.
//! let shutdown_signal = CancellationToken::new();
//! let pool = WorkerPool::new(&shutdown_signal, 4, 1000)?;
//!
//! // Submission is fire-and-forget; a pool that is shutting down or
//! // cancelled discards silently.
//! for i in 0..10 {
//!     pool.execute(move || {
//!         println!("job {} executing", i);
//!         Ok(())
//!     });
//! }
//!
//! // Drains the backlog, then joins every thread.
//! pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use paced_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let signal = CancellationToken::new();
//! let config = PoolConfig::new(8, 250).with_queue_capacity(1000);
//!
//! let pool = WorkerPool::with_config(&signal, config)?;
//! # pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Cancellation
//!
//! The pool listens on a child of the token it was built under, so one
//! parent token can tear down several pools at once. Cancelling discards
//! everything that has not started executing; jobs already running finish.
//!
//! ```rust
//! use paced_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let signal = CancellationToken::new();
//! let pool = WorkerPool::new(&signal, 2, 5)?;
//!
//! for _ in 0..100 {
//!     pool.execute(|| Ok(()));
//! }
//!
//! // At 5 starts per second the backlog would take ~20s to drain.
//! // Cancelling abandons it instead.
//! signal.cancel();
//! pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Jobs
//!
//! ```rust
//! use paced_pool::prelude::*;
//!
//! struct MyJob {
//!     data: String,
//! }
//!
//! impl Job for MyJob {
//!     fn execute(&mut self) -> Result<()> {
//!         println!("processing: {}", self.data);
//!         Ok(())
//!     }
//!
//!     fn job_type(&self) -> &str {
//!         "MyJob"
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! # let signal = CancellationToken::new();
//! # let pool = WorkerPool::new(&signal, 2, 1000)?;
//! pool.submit(MyJob {
//!     data: "test".to_string(),
//! });
//! # pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Worker Statistics
//!
//! ```rust
//! use paced_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! # let signal = CancellationToken::new();
//! # let pool = WorkerPool::new(&signal, 2, 1000)?;
//! # for _ in 0..10 {
//! #     pool.execute(|| Ok(()));
//! # }
//! # pool.shutdown()?;
//! for (i, stats) in pool.worker_stats().iter().enumerate() {
//!     println!("worker {}: {} jobs processed", i, stats.get_jobs_processed());
//! }
//!
//! println!("total: {}", pool.total_jobs_processed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod limiter;
pub mod pool;
pub mod prelude;
pub mod queue;
#[cfg(feature = "tracing")]
pub mod tracing;

pub use crate::core::{
    BoxedJob, CancellationReason, CancellationToken, Cancelled, ClosureJob, Job, PoolError, Result,
};
pub use crate::limiter::TokenBucket;
pub use crate::pool::{DispatcherStats, PoolConfig, WorkerPool, WorkerStats};
