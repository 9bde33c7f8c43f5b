//! Job hand-off queues
//!
//! The pool moves work through two bounded FIFO stages: the submission queue
//! (producers to dispatcher) and the gated queue (dispatcher to workers).
//! This module provides [`BoundedQueue`], the submission stage. The gated
//! stage is a plain bounded channel owned by the dispatcher, because closing
//! it is exactly "the dispatcher dropped its sender".
//!
//! Closing a [`BoundedQueue`] drops its sender, so once in-flight sends
//! finish and the buffer drains, the consuming receiver disconnects. That
//! makes "closed and empty" a channel-level event the consumer observes
//! without polling, and it wakes producers blocked on a full queue the moment
//! the consumer goes away.

pub mod bounded;

pub use bounded::BoundedQueue;

use crate::core::BoxedJob;

/// Errors from queue operations
///
/// Rejected submissions hand the job back to the caller inside the error, so
/// it can be retried, re-routed, or dropped deliberately.
#[derive(Debug)]
pub enum QueueError {
    /// Queue is full (non-blocking send)
    Full(BoxedJob),
    /// Queue has been closed and accepts no new jobs
    Closed(BoxedJob),
    /// Send timed out waiting for queue space
    Timeout(BoxedJob),
    /// Send was abandoned because the cancellation signal fired
    Cancelled(BoxedJob),
}

impl QueueError {
    /// Recovers the rejected job from the error
    pub fn into_job(self) -> BoxedJob {
        match self {
            QueueError::Full(job)
            | QueueError::Closed(job)
            | QueueError::Timeout(job)
            | QueueError::Cancelled(job) => job,
        }
    }
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Full(_) => write!(f, "queue is full"),
            QueueError::Closed(_) => write!(f, "queue is closed"),
            QueueError::Timeout(_) => write!(f, "send timed out"),
            QueueError::Cancelled(_) => write!(f, "send cancelled"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Result type for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;
