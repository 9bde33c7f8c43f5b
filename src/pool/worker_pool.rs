//! Rate-limited worker pool implementation

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel;
use log::{debug, error, trace, warn};
use parking_lot::Mutex;

use crate::core::{BoxedJob, CancellationToken, ClosureJob, Job, PoolError, Result};
use crate::limiter::TokenBucket;
use crate::pool::{Dispatcher, DispatcherStats, Worker, WorkerStats};
use crate::queue::{BoundedQueue, QueueError};

/// Configuration for a worker pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads
    pub worker_count: usize,
    /// Maximum number of job starts per second
    pub rate_per_second: u32,
    /// Capacity of the submission queue
    pub queue_capacity: usize,
    /// Name prefix for worker threads
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: thread::available_parallelism().map_or(4, usize::from),
            rate_per_second: 100,
            // Bounded by default so a runaway producer backpressures
            // instead of exhausting memory
            queue_capacity: 10_000,
            thread_name_prefix: "worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with the given worker count and rate
    #[must_use]
    pub fn new(worker_count: usize, rate_per_second: u32) -> Self {
        Self {
            worker_count,
            rate_per_second,
            ..Default::default()
        }
    }

    /// Set the submission queue capacity
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the worker thread name prefix
    ///
    /// Workers are named `{prefix}-{id}`, which shows up in panic messages
    /// and debugger thread lists.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(PoolError::invalid_config(
                "worker_count",
                "number of workers must be greater than 0",
            ));
        }
        if self.rate_per_second == 0 {
            return Err(PoolError::invalid_config(
                "rate_per_second",
                "rate must be greater than 0",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::invalid_config(
                "queue_capacity",
                "queue capacity must be greater than 0",
            ));
        }
        Ok(())
    }
}

struct PoolMembers {
    dispatcher: Option<Dispatcher>,
    workers: Vec<Worker>,
}

/// A pool of worker threads fed through a token-bucket rate limiter
///
/// Jobs flow through two stages: producers push into a bounded submission
/// queue, and a single dispatcher meters them out to workers, acquiring one
/// rate-limiter token per job. Workers therefore never start more than the
/// configured number of jobs per second, no matter how many are queued or
/// how many workers are idle.
///
/// The pool derives a child of the cancellation token passed at
/// construction. Cancelling the parent (or calling
/// [`cancel`](WorkerPool::cancel)) promptly stops every stage: blocked
/// submitters, the dispatcher in mid-pacing, and idle workers all wake and
/// discard whatever work has not yet started.
///
/// All threads are running when the constructor returns; there is no
/// separate start step.
///
/// # Shutdown
///
/// [`shutdown`](WorkerPool::shutdown) closes the submission queue and waits
/// for the backlog to drain through the limiter. Jobs accepted before the
/// close all execute; jobs submitted after are silently discarded. For an
/// immediate stop, cancel the token first and then call `shutdown` to reap
/// the threads.
///
/// # Example
///
/// ```rust
/// use paced_pool::prelude::*;
///
/// # fn main() -> Result<()> {
/// let shutdown_signal = CancellationToken::new();
/// let pool = WorkerPool::new(&shutdown_signal, 4, 100)?;
///
/// pool.execute(|| {
///     println!("hello from the pool");
///     Ok(())
/// });
///
/// pool.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool {
    config: PoolConfig,
    signal: CancellationToken,
    queue: Arc<BoundedQueue>,
    members: Mutex<PoolMembers>,
    worker_stats: Vec<Arc<WorkerStats>>,
    dispatcher_stats: Arc<DispatcherStats>,
    total_jobs_submitted: AtomicU64,
}

impl WorkerPool {
    /// Create a pool with the given worker count and rate, under `parent`
    ///
    /// Equivalent to [`with_config`](WorkerPool::with_config) with a default
    /// submission queue capacity.
    pub fn new(
        parent: &CancellationToken,
        worker_count: usize,
        rate_per_second: u32,
    ) -> Result<Self> {
        Self::with_config(parent, PoolConfig::new(worker_count, rate_per_second))
    }

    /// Create a pool from a full configuration, under `parent`
    ///
    /// The pool listens on a child of `parent`, so cancelling the parent
    /// tears the pool down while cancelling the pool leaves the parent and
    /// any sibling pools untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for a zero worker count, rate,
    /// or queue capacity, and [`PoolError::Spawn`] if a thread could not be
    /// started. On a failed spawn every thread already started is reaped
    /// before returning.
    pub fn with_config(parent: &CancellationToken, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let signal = parent.child();
        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let submission = match queue.take_receiver() {
            Some(receiver) => receiver,
            None => return Err(PoolError::other("submission receiver already taken")),
        };

        // Gated capacity matches the worker count so the dispatcher can keep
        // every worker supplied without building up a second backlog that
        // would outlive a cancellation.
        let (gated_tx, gated_rx) = channel::bounded(config.worker_count);
        let limiter = Arc::new(TokenBucket::new(config.rate_per_second));

        let dispatcher = Dispatcher::new(submission, gated_tx, limiter, signal.clone())?;
        let dispatcher_stats = dispatcher.stats();

        let mut workers = Vec::with_capacity(config.worker_count);
        for id in 0..config.worker_count {
            match Worker::new(
                id,
                &config.thread_name_prefix,
                gated_rx.clone(),
                signal.clone(),
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    signal.cancel();
                    drop(gated_rx);
                    if let Err(join_err) = dispatcher.join() {
                        warn!("reaping dispatcher after failed spawn: {join_err}");
                    }
                    for worker in workers {
                        if let Err(join_err) = worker.join() {
                            warn!("reaping worker after failed spawn: {join_err}");
                        }
                    }
                    return Err(e);
                }
            }
        }
        // Workers hold their own clones; a receiver parked here would keep
        // the gated channel connected after they exit.
        drop(gated_rx);

        let worker_stats = workers.iter().map(Worker::stats).collect();

        debug!(
            "pool started: {} workers at {} jobs/sec, queue capacity {}",
            config.worker_count, config.rate_per_second, config.queue_capacity
        );

        Ok(Self {
            config,
            signal,
            queue,
            members: Mutex::new(PoolMembers {
                dispatcher: Some(dispatcher),
                workers,
            }),
            worker_stats,
            dispatcher_stats,
            total_jobs_submitted: AtomicU64::new(0),
        })
    }

    /// Submit a job to the pool
    ///
    /// Blocks while the submission queue is full. If the pool has been shut
    /// down or its cancellation signal has fired, the job is silently
    /// discarded; submission is fire-and-forget by design, and a paced
    /// pipeline never promises execution anyway.
    ///
    /// Use [`try_submit`](WorkerPool::try_submit) or
    /// [`submit_timeout`](WorkerPool::submit_timeout) when the caller needs
    /// to know whether the job was accepted.
    pub fn submit<J: Job + 'static>(&self, job: J) {
        self.submit_boxed(Box::new(job));
    }

    /// Submit a closure as a job
    ///
    /// Discard semantics are the same as [`submit`](WorkerPool::submit).
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.submit(ClosureJob::new(f));
    }

    fn submit_boxed(&self, job: BoxedJob) {
        match self.queue.send(job, &self.signal) {
            Ok(()) => {
                self.total_jobs_submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => trace!("submission discarded: {err}"),
        }
    }

    /// Submit a job without blocking
    ///
    /// # Errors
    ///
    /// - [`PoolError::QueueFull`] - submission queue is at capacity
    /// - [`PoolError::ShuttingDown`] - pool has been shut down
    /// - [`PoolError::Cancelled`] - cancellation signal has fired
    ///
    /// # Example
    ///
    /// ```rust
    /// use paced_pool::prelude::*;
    ///
    /// # fn main() -> Result<()> {
    /// let signal = CancellationToken::new();
    /// let pool = WorkerPool::new(&signal, 2, 1000)?;
    ///
    /// match pool.try_submit(ClosureJob::new(|| Ok(()))) {
    ///     Ok(()) => println!("accepted"),
    ///     Err(PoolError::QueueFull { .. }) => println!("queue full, try later"),
    ///     Err(e) => println!("error: {e}"),
    /// }
    /// # pool.shutdown()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn try_submit<J: Job + 'static>(&self, job: J) -> Result<()> {
        self.signal.check()?;
        self.queue
            .try_send(Box::new(job))
            .map_err(|err| self.submission_error(err, None))?;
        self.total_jobs_submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Submit a closure without blocking
    ///
    /// Errors are the same as [`try_submit`](WorkerPool::try_submit).
    pub fn try_execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.try_submit(ClosureJob::new(f))
    }

    /// Submit a job, waiting at most `timeout` for queue space
    ///
    /// # Errors
    ///
    /// - [`PoolError::SubmissionTimeout`] - no space freed within `timeout`
    /// - [`PoolError::ShuttingDown`] - pool has been shut down
    /// - [`PoolError::Cancelled`] - cancellation signal fired while waiting
    pub fn submit_timeout<J: Job + 'static>(&self, job: J, timeout: Duration) -> Result<()> {
        self.queue
            .send_timeout(Box::new(job), timeout, &self.signal)
            .map_err(|err| self.submission_error(err, Some(timeout)))?;
        self.total_jobs_submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Submit a closure, waiting at most `timeout` for queue space
    ///
    /// Errors are the same as [`submit_timeout`](WorkerPool::submit_timeout).
    pub fn execute_timeout<F>(&self, f: F, timeout: Duration) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.submit_timeout(ClosureJob::new(f), timeout)
    }

    /// Submit a job wrapped in a tracing span
    ///
    /// Discard semantics are the same as [`submit`](WorkerPool::submit).
    #[cfg(feature = "tracing")]
    pub fn submit_traced<J: Job + 'static>(&self, job: J) {
        self.submit_boxed(Box::new(crate::tracing::TracedJob::new(job)));
    }

    fn submission_error(&self, err: QueueError, timeout: Option<Duration>) -> PoolError {
        match err {
            QueueError::Full(_) => PoolError::queue_full(self.config.queue_capacity),
            QueueError::Closed(_) => PoolError::ShuttingDown,
            QueueError::Timeout(_) => {
                PoolError::submission_timeout(timeout.map_or(0, |t| t.as_millis() as u64))
            }
            QueueError::Cancelled(_) => match self.signal.check() {
                Err(e) => e,
                Ok(()) => PoolError::ShuttingDown,
            },
        }
    }

    /// Cancel the pool's own cancellation token
    ///
    /// Equivalent to cancelling the parent as far as this pool is
    /// concerned, but leaves the parent and any siblings untouched. Threads
    /// are not reaped until [`shutdown`](WorkerPool::shutdown) or drop.
    pub fn cancel(&self) {
        self.signal.cancel();
    }

    /// The pool's own cancellation token
    ///
    /// Jobs that want to observe cancellation mid-execution can clone this
    /// and check it cooperatively.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.signal
    }

    /// Shut down the pool and wait for its threads to finish
    ///
    /// Closes the submission queue, then joins the dispatcher and every
    /// worker. Jobs accepted before the close drain through the limiter at
    /// the configured rate; jobs submitted after the close are discarded.
    /// If the cancellation signal has fired, the drain is skipped and the
    /// threads are reaped as soon as they observe the signal.
    ///
    /// Safe to call multiple times and from multiple threads; concurrent
    /// callers block until the pool has quiesced, and later calls return
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Join`] if a pool thread itself panicked. All
    /// threads are reaped even when one of them fails; the first failure is
    /// reported.
    pub fn shutdown(&self) -> Result<()> {
        self.queue.close();

        let mut members = self.members.lock();
        if members.dispatcher.is_none() && members.workers.is_empty() {
            return Ok(());
        }
        debug!("pool shutting down");

        let mut first_error = None;
        if let Some(dispatcher) = members.dispatcher.take() {
            if let Err(e) = dispatcher.join() {
                error!("shutdown: {e}");
                first_error.get_or_insert(e);
            }
        }
        for worker in members.workers.drain(..) {
            if let Err(e) = worker.join() {
                error!("shutdown: {e}");
                first_error.get_or_insert(e);
            }
        }

        debug!(
            "pool shut down: {} submitted, {} dispatched, {} discarded",
            self.total_jobs_submitted.load(Ordering::Relaxed),
            self.dispatcher_stats.get_jobs_dispatched(),
            self.dispatcher_stats.get_jobs_discarded()
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Configured rate limit in job starts per second
    pub fn rate_per_second(&self) -> u32 {
        self.config.rate_per_second
    }

    /// Capacity of the submission queue
    pub fn queue_capacity(&self) -> usize {
        self.config.queue_capacity
    }

    /// Jobs currently waiting in the submission queue (approximate)
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Whether the pool still accepts submissions
    pub fn is_running(&self) -> bool {
        !self.queue.is_closed() && !self.signal.is_cancelled()
    }

    /// Whether the pool's cancellation signal has fired
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Pool threads not yet reaped
    ///
    /// Counts the dispatcher and workers still owned by the pool. Zero
    /// after [`shutdown`](WorkerPool::shutdown) completes. Blocks while a
    /// shutdown is in progress.
    pub fn actor_count(&self) -> usize {
        let members = self.members.lock();
        members.workers.len() + usize::from(members.dispatcher.is_some())
    }

    /// Total jobs accepted into the submission queue
    pub fn total_jobs_submitted(&self) -> u64 {
        self.total_jobs_submitted.load(Ordering::Relaxed)
    }

    /// Total jobs that ran to completion, summed across workers
    pub fn total_jobs_processed(&self) -> u64 {
        self.worker_stats
            .iter()
            .map(|s| s.get_jobs_processed())
            .sum()
    }

    /// Total jobs that returned an error, summed across workers
    pub fn total_jobs_failed(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.get_jobs_failed()).sum()
    }

    /// Total jobs that panicked, summed across workers
    pub fn total_jobs_panicked(&self) -> u64 {
        self.worker_stats
            .iter()
            .map(|s| s.get_jobs_panicked())
            .sum()
    }

    /// Total jobs the dispatcher has released to workers
    pub fn jobs_dispatched(&self) -> u64 {
        self.dispatcher_stats.get_jobs_dispatched()
    }

    /// Total jobs the dispatcher pulled but dropped under cancellation
    ///
    /// Jobs still sitting in the submission queue when the pool is torn
    /// down are not counted here; only a job already in the dispatcher's
    /// hands when the signal fired is.
    pub fn jobs_discarded(&self) -> u64 {
        self.dispatcher_stats.get_jobs_discarded()
    }

    /// Per-worker statistics
    ///
    /// The handles stay valid after shutdown, so final counts can be read
    /// once the pool has quiesced.
    pub fn worker_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.worker_stats.clone()
    }

    /// Dispatcher statistics
    pub fn dispatcher_stats(&self) -> Arc<DispatcherStats> {
        Arc::clone(&self.dispatcher_stats)
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("cancelled", &self.signal.is_cancelled())
            .field("queue_depth", &self.queue.len())
            .field(
                "total_jobs_submitted",
                &self.total_jobs_submitted.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl Drop for WorkerPool {
    /// Drains and reaps the pool if [`shutdown`](WorkerPool::shutdown) was
    /// never called. Cancel the token first when dropping must not wait for
    /// the backlog.
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("pool shutdown during drop failed: {e}");
        }
    }
}
