//! Dispatcher thread implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, trace};

use crate::core::{BoxedJob, CancellationToken, PoolError, Result};
use crate::limiter::TokenBucket;
use crate::pool::panic_message;

/// Statistics for the dispatcher thread
#[derive(Debug, Default)]
pub struct DispatcherStats {
    jobs_dispatched: AtomicU64,
    jobs_discarded: AtomicU64,
}

impl DispatcherStats {
    /// Create new dispatcher statistics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment_dispatched(&self) {
        self.jobs_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_discarded(&self) {
        self.jobs_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Total jobs released to workers
    pub fn get_jobs_dispatched(&self) -> u64 {
        self.jobs_dispatched.load(Ordering::Relaxed)
    }

    /// Total jobs dropped at the dispatch stage because cancellation fired
    pub fn get_jobs_discarded(&self) -> u64 {
        self.jobs_discarded.load(Ordering::Relaxed)
    }
}

/// The single thread that meters jobs out of the submission queue
///
/// The dispatcher is the only consumer of the submission queue and the only
/// producer of the gated channel, so the job stream stays FIFO end to end.
/// For every job it pulls, it first acquires a token from the rate limiter,
/// then forwards the job to a worker. Both waits watch the cancellation
/// signal; if it fires the job in hand is discarded and the loop exits.
///
/// On exit the dispatcher drops its gated sender. Workers drain whatever was
/// already released and then see the channel disconnect, which is their
/// graceful shutdown cue.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    thread: Option<thread::JoinHandle<()>>,
    stats: Arc<DispatcherStats>,
}

impl Dispatcher {
    /// Spawns the dispatcher between `submission` and `gated`
    pub fn new(
        submission: Receiver<BoxedJob>,
        gated: Sender<BoxedJob>,
        limiter: Arc<TokenBucket>,
        signal: CancellationToken,
    ) -> Result<Self> {
        let stats = Arc::new(DispatcherStats::new());
        let stats_clone = Arc::clone(&stats);

        let thread = thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || {
                Self::run(submission, gated, limiter, signal, stats_clone);
            })
            .map_err(|e| PoolError::spawn("dispatcher", e))?;

        Ok(Self {
            thread: Some(thread),
            stats,
        })
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> Arc<DispatcherStats> {
        Arc::clone(&self.stats)
    }

    /// Join the dispatcher thread
    pub fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|panic| PoolError::join("dispatcher", panic_message(&panic)))?;
        }
        Ok(())
    }

    /// Main dispatch loop
    ///
    /// The submission receiver disconnecting means the queue was closed and
    /// has drained, so a plain `recv` error is the graceful exit. The
    /// forward into `gated` blocks while every worker is busy, which is how
    /// worker availability backpressures the limiter.
    fn run(
        submission: Receiver<BoxedJob>,
        gated: Sender<BoxedJob>,
        limiter: Arc<TokenBucket>,
        signal: CancellationToken,
        stats: Arc<DispatcherStats>,
    ) {
        debug!(
            "dispatcher started at {} jobs/sec",
            limiter.rate_per_second()
        );
        let done = signal.done_channel();

        loop {
            // select! picks randomly among ready arms; the explicit check
            // keeps a fired signal from losing the race against a non-empty
            // submission queue.
            if signal.is_cancelled() {
                break;
            }

            let job = channel::select! {
                recv(done) -> _ => break,
                recv(submission) -> msg => match msg {
                    Ok(job) => job,
                    Err(_) => break,
                },
            };

            if limiter.acquire(&signal).is_err() {
                trace!("dispatcher discarding {:?}: cancelled while paced", job);
                stats.increment_discarded();
                break;
            }

            channel::select! {
                send(gated, job) -> result => {
                    if result.is_err() {
                        stats.increment_discarded();
                        break;
                    }
                    stats.increment_dispatched();
                }
                recv(done) -> _ => {
                    stats.increment_discarded();
                    break;
                }
            }
        }

        debug!(
            "dispatcher stopping: {} dispatched, {} discarded",
            stats.get_jobs_dispatched(),
            stats.get_jobs_discarded()
        );
    }
}
