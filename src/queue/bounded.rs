//! Bounded submission queue with cancel-aware producers

use std::fmt;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};

use crate::core::{BoxedJob, CancellationToken};
use crate::queue::{QueueError, QueueResult};

/// Fixed-capacity FIFO queue between job producers and the dispatcher
///
/// Producers block when the buffer is full, which is the pool's only
/// backpressure mechanism. A blocking send watches the cancellation signal
/// and abandons the hand-off the moment it fires, returning the job to the
/// caller.
///
/// [`close`](BoundedQueue::close) drops the internal sender. In-flight sends
/// that already hold a clone still complete, later sends observe
/// [`QueueError::Closed`], and once the buffer drains the receiver
/// disconnects. The consumer therefore learns "closed and empty" from a
/// plain `recv` error instead of polling a flag.
///
/// The consuming side is handed out exactly once via
/// [`take_receiver`](BoundedQueue::take_receiver) as a raw channel receiver,
/// so the dispatcher can fold it into a `select!` loop. Keeping a second
/// receiver alive inside the queue would defeat the disconnect-based wakeup
/// of blocked producers, so the queue never retains one.
///
/// # Example
///
/// ```rust
/// use paced_pool::core::{CancellationToken, ClosureJob, Job};
/// use paced_pool::queue::BoundedQueue;
///
/// let queue = BoundedQueue::new(8);
/// let signal = CancellationToken::new();
///
/// queue
///     .send(Box::new(ClosureJob::new(|| Ok(()))), &signal)
///     .unwrap();
///
/// let receiver = queue.take_receiver().unwrap();
/// let mut job = receiver.recv().unwrap();
/// job.execute().unwrap();
/// ```
pub struct BoundedQueue {
    sender: RwLock<Option<Sender<BoxedJob>>>,
    receiver: Mutex<Option<Receiver<BoxedJob>>>,
    capacity: usize,
}

impl BoundedQueue {
    /// Creates a queue holding at most `capacity` jobs
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0. A zero-capacity rendezvous channel would
    /// couple every producer to a dispatcher pull, which is not what a
    /// submission buffer is for.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        let (sender, receiver) = channel::bounded(capacity);
        Self {
            sender: RwLock::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            capacity,
        }
    }

    /// Sends a job, blocking while the queue is full
    ///
    /// The wait ends as soon as space frees, the queue's consumer goes
    /// away, or `signal` fires.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the queue was closed or its
    /// receiver dropped, and [`QueueError::Cancelled`] if `signal` fired
    /// first. Both variants carry the unsent job.
    pub fn send(&self, job: BoxedJob, signal: &CancellationToken) -> QueueResult<()> {
        let sender = match self.sender.read().as_ref() {
            Some(sender) => sender.clone(),
            None => return Err(QueueError::Closed(job)),
        };
        if signal.is_cancelled() {
            return Err(QueueError::Cancelled(job));
        }

        let done = signal.done_channel();
        channel::select! {
            send(sender, job) -> result => {
                result.map_err(|err| QueueError::Closed(err.into_inner()))
            }
            recv(done) -> _ => Err(QueueError::Cancelled(job)),
        }
    }

    /// Sends a job without blocking
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] when the buffer has no space and
    /// [`QueueError::Closed`] when the queue no longer accepts jobs. Both
    /// variants carry the unsent job.
    pub fn try_send(&self, job: BoxedJob) -> QueueResult<()> {
        let sender = match self.sender.read().as_ref() {
            Some(sender) => sender.clone(),
            None => return Err(QueueError::Closed(job)),
        };
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => Err(QueueError::Full(job)),
            Err(TrySendError::Disconnected(job)) => Err(QueueError::Closed(job)),
        }
    }

    /// Sends a job, blocking at most `timeout` while the queue is full
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Timeout`] when the deadline passes first, in
    /// addition to the errors [`send`](BoundedQueue::send) can produce.
    pub fn send_timeout(
        &self,
        job: BoxedJob,
        timeout: Duration,
        signal: &CancellationToken,
    ) -> QueueResult<()> {
        let sender = match self.sender.read().as_ref() {
            Some(sender) => sender.clone(),
            None => return Err(QueueError::Closed(job)),
        };
        if signal.is_cancelled() {
            return Err(QueueError::Cancelled(job));
        }

        let done = signal.done_channel();
        channel::select! {
            send(sender, job) -> result => {
                result.map_err(|err| QueueError::Closed(err.into_inner()))
            }
            recv(done) -> _ => Err(QueueError::Cancelled(job)),
            recv(channel::after(timeout)) -> _ => Err(QueueError::Timeout(job)),
        }
    }

    /// Takes the consuming end of the queue
    ///
    /// Returns `None` on every call after the first. The receiver is not
    /// cloned internally, so dropping it wakes all blocked producers.
    pub fn take_receiver(&self) -> Option<Receiver<BoxedJob>> {
        self.receiver.lock().take()
    }

    /// Closes the queue to new submissions
    ///
    /// Jobs already buffered remain receivable; the receiver disconnects
    /// once they are drained. Calling `close` again has no effect.
    pub fn close(&self) {
        self.sender.write().take();
    }

    /// Returns `true` once [`close`](BoundedQueue::close) has been called
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Number of jobs currently buffered
    ///
    /// A closed queue reports zero even while the dispatcher is still
    /// draining it, since the producer side it is measured from is gone.
    pub fn len(&self) -> usize {
        self.sender.read().as_ref().map_or(0, Sender::len)
    }

    /// Returns `true` when no jobs are buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of buffered jobs
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Debug for BoundedQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
