//! Worker thread implementation

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam::channel::{self, Receiver};
use log::{debug, error, trace, warn};

use crate::core::{BoxedJob, CancellationToken, PoolError, Result};
use crate::pool::panic_message;

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    jobs_processed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_panicked: AtomicU64,
    total_processing_time_us: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment_processed(&self) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_panicked(&self) {
        self.jobs_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_processing_time(&self, microseconds: u64) {
        self.total_processing_time_us
            .fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Total jobs that ran to completion
    pub fn get_jobs_processed(&self) -> u64 {
        self.jobs_processed.load(Ordering::Relaxed)
    }

    /// Total jobs that returned an error
    pub fn get_jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    /// Total jobs that panicked
    pub fn get_jobs_panicked(&self) -> u64 {
        self.jobs_panicked.load(Ordering::Relaxed)
    }

    /// Total time spent executing jobs, in microseconds
    ///
    /// Counts successful, failed, and panicking executions alike.
    pub fn get_total_processing_time_us(&self) -> u64 {
        self.total_processing_time_us.load(Ordering::Relaxed)
    }

    /// Average processing time per completed job, in microseconds
    pub fn get_average_processing_time_us(&self) -> f64 {
        let total = self.total_processing_time_us.load(Ordering::Relaxed);
        let count = self.jobs_processed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }
}

/// A worker thread that executes rate-released jobs
///
/// Workers pull from the gated channel the dispatcher feeds. They exit when
/// the cancellation signal fires or when the gated channel disconnects,
/// whichever comes first. A job pulled in the same instant the signal fires
/// is dropped, not executed; the signal is re-checked after every pull.
#[derive(Debug)]
pub(crate) struct Worker {
    id: usize,
    name: String,
    thread: Option<thread::JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawns a worker named `{name_prefix}-{id}` consuming `gated` under `signal`
    pub fn new(
        id: usize,
        name_prefix: &str,
        gated: Receiver<BoxedJob>,
        signal: CancellationToken,
    ) -> Result<Self> {
        let name = format!("{name_prefix}-{id}");
        let stats = Arc::new(WorkerStats::new());
        let stats_clone = Arc::clone(&stats);

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                Self::run(id, gated, signal, stats_clone);
            })
            .map_err(|e| PoolError::spawn(name.clone(), e))?;

        Ok(Self {
            id,
            name,
            thread: Some(thread),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Join the worker thread
    pub fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|panic| PoolError::join(self.name.as_str(), panic_message(&panic)))?;
        }
        Ok(())
    }

    /// Main worker loop
    ///
    /// The receiver disconnecting means the dispatcher is gone and every
    /// released job has been picked up, so a plain `recv` error is the
    /// graceful exit. The signal firing is the forced one.
    fn run(
        id: usize,
        gated: Receiver<BoxedJob>,
        signal: CancellationToken,
        stats: Arc<WorkerStats>,
    ) {
        debug!("worker {id} started");
        let done = signal.done_channel();

        loop {
            channel::select! {
                recv(done) -> _ => break,
                recv(gated) -> msg => match msg {
                    Ok(mut job) => {
                        if signal.is_cancelled() {
                            trace!("worker {id} dropping {:?} after cancellation", job);
                            break;
                        }
                        Self::execute_job(id, &mut job, &stats);
                    }
                    Err(_) => break,
                },
            }
        }

        debug!(
            "worker {id} stopping: {} processed, {} failed, {} panicked",
            stats.get_jobs_processed(),
            stats.get_jobs_failed(),
            stats.get_jobs_panicked()
        );
    }

    /// Execute a single job with panic protection
    fn execute_job(id: usize, job: &mut BoxedJob, stats: &WorkerStats) {
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| job.execute()));
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(())) => {
                stats.increment_processed();
                trace!("worker {id} completed {:?} in {elapsed:?}", job);
            }
            Ok(Err(e)) => {
                stats.increment_failed();
                warn!("worker {id}: {:?} failed: {e}", job);
            }
            Err(panic) => {
                stats.increment_panicked();
                error!("worker {id}: {:?} panicked: {}", job, panic_message(&panic));
            }
        }

        stats.add_processing_time(elapsed.as_micros() as u64);
    }
}
