//! Cooperative cancellation infrastructure
//!
//! This module provides the single-fire broadcast signal that coordinates
//! shutdown across the pool's actors. A [`CancellationToken`] fires at most
//! once, never un-fires, and is observable by any number of waiters, either
//! through cheap polling ([`is_cancelled()`](CancellationToken::is_cancelled))
//! or through a waitable channel ([`done_channel()`](CancellationToken::done_channel))
//! that can participate in `crossbeam::channel::select!` so blocked threads
//! wake promptly instead of polling.
//!
//! # Features
//!
//! - **Hierarchical cancellation**: Create child tokens that are automatically
//!   cancelled when their parent is cancelled
//! - **Timeout cancellation**: Create tokens that auto-cancel after a specified duration
//! - **Waitable broadcast**: Every blocked operation can select on the done
//!   channel as a second wake reason
//! - **Cancellation reasons**: Track why a token was cancelled
//!
//! # Example
//!
//! ```rust
//! use paced_pool::CancellationToken;
//!
//! // Create a parent token
//! let parent = CancellationToken::new();
//!
//! // Create child tokens
//! let child1 = parent.child();
//! let child2 = parent.child();
//!
//! // Cancel parent - all children are also cancelled
//! parent.cancel();
//!
//! assert!(parent.is_cancelled());
//! assert!(child1.is_cancelled());
//! assert!(child2.is_cancelled());
//! ```

use crate::core::Result;
use crate::PoolError;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Reason for cancellation
///
/// Describes why a cancellation token was cancelled, which is useful for
/// logging and debugging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// Explicitly cancelled by user via `cancel()` or `cancel_with_reason()`
    Manual,
    /// Cancelled due to timeout expiration
    Timeout(Duration),
    /// Cancelled because the parent token was cancelled
    ParentCancelled,
}

impl std::fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellationReason::Manual => write!(f, "manually cancelled"),
            CancellationReason::Timeout(d) => write!(f, "timeout after {:?}", d),
            CancellationReason::ParentCancelled => write!(f, "parent was cancelled"),
        }
    }
}

/// Marker returned by blocking operations that were interrupted by cancellation
///
/// Cancellation is a control signal rather than a failure, so operations that
/// can be woken by it return `Result<T, Cancelled>` instead of folding the
/// outcome into [`PoolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Internal state for a cancellation token
///
/// The done channel is the broadcast primitive: nothing is ever sent through
/// it, and cancelling drops the sender, which disconnects every cloned
/// receiver at once.
struct CancellationTokenInner {
    /// Cancellation state
    cancelled: AtomicBool,
    /// Child tokens (weak references to avoid cycles)
    children: RwLock<Vec<Weak<CancellationTokenInner>>>,
    /// Cancellation reason
    reason: RwLock<Option<CancellationReason>>,
    /// Dropped on cancellation; guarded so exactly one cancel releases it
    done_tx: Mutex<Option<Sender<Infallible>>>,
    /// Cloned out to waiters; disconnects when `done_tx` is dropped
    done_rx: Receiver<Infallible>,
}

impl std::fmt::Debug for CancellationTokenInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationTokenInner")
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .field("children_count", &self.children.read().len())
            .field("reason", &*self.reason.read())
            .finish()
    }
}

/// A thread-safe, single-fire cancellation token shared between the pool and its caller
///
/// # Features
///
/// - **Hierarchical cancellation**: child tokens via [`child()`](Self::child)
///   are cancelled automatically when the parent is cancelled
/// - **Timeout cancellation**: tokens that auto-cancel after a duration via
///   [`with_timeout()`](Self::with_timeout)
/// - **Waitable broadcast**: [`done_channel()`](Self::done_channel) yields a
///   receiver that disconnects on cancellation, usable in
///   `crossbeam::channel::select!`
/// - **Cancellation reasons**: the first cancellation records why via
///   [`reason()`](Self::reason)
///
/// A token fires at most once and never reverts to the uncancelled state.
///
/// # Example
///
/// ```rust
/// use paced_pool::CancellationToken;
/// use std::thread;
/// use std::time::Duration;
///
/// let token = CancellationToken::new();
/// let token_clone = token.clone();
///
/// // Spawn a thread that blocks until cancellation
/// let handle = thread::spawn(move || {
///     token_clone.wait();
///     "woken"
/// });
///
/// thread::sleep(Duration::from_millis(50));
/// token.cancel();
///
/// assert_eq!(handle.join().unwrap(), "woken");
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationTokenInner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

impl CancellationToken {
    /// Create a new cancellation token (not cancelled)
    pub fn new() -> Self {
        let (done_tx, done_rx) = bounded::<Infallible>(0);
        Self {
            inner: Arc::new(CancellationTokenInner {
                cancelled: AtomicBool::new(false),
                children: RwLock::new(Vec::new()),
                reason: RwLock::new(None),
                done_tx: Mutex::new(Some(done_tx)),
                done_rx,
            }),
        }
    }

    /// Creates a child token linked to this parent
    ///
    /// The child token is automatically cancelled when the parent is cancelled.
    /// If the parent is already cancelled when this is called, the child is
    /// created in a cancelled state. Cancelling a child never affects the
    /// parent or siblings.
    ///
    /// # Example
    ///
    /// ```rust
    /// use paced_pool::CancellationToken;
    ///
    /// let parent = CancellationToken::new();
    /// let child = parent.child();
    ///
    /// parent.cancel();
    /// assert!(child.is_cancelled());
    /// ```
    pub fn child(&self) -> Self {
        let child = CancellationToken::new();

        // Register with parent
        self.inner
            .children
            .write()
            .push(Arc::downgrade(&child.inner));

        // If parent already cancelled, cancel child immediately
        if self.is_cancelled() {
            child.cancel_with_reason(CancellationReason::ParentCancelled);
        }

        child
    }

    /// Creates a token that auto-cancels after the specified timeout
    ///
    /// A background timer thread triggers the cancellation. The timer selects
    /// on the done channel, so if the token is cancelled manually before the
    /// timeout, the thread exits immediately instead of sleeping out the
    /// remaining duration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use paced_pool::{CancellationToken, CancellationReason};
    /// use std::time::Duration;
    /// use std::thread;
    ///
    /// let token = CancellationToken::with_timeout(Duration::from_millis(50));
    /// assert!(!token.is_cancelled());
    ///
    /// thread::sleep(Duration::from_millis(150));
    /// assert!(token.is_cancelled());
    /// assert_eq!(token.reason(), Some(CancellationReason::Timeout(Duration::from_millis(50))));
    /// ```
    pub fn with_timeout(timeout: Duration) -> Self {
        let token = Self::new();
        token.spawn_timer(timeout);
        token
    }

    /// Creates a child token that auto-cancels after the specified timeout
    ///
    /// The token is cancelled either when the parent is cancelled or when the
    /// timeout expires, whichever happens first.
    ///
    /// # Example
    ///
    /// ```rust
    /// use paced_pool::CancellationToken;
    /// use std::time::Duration;
    ///
    /// let parent = CancellationToken::new();
    /// let child = parent.child_with_timeout(Duration::from_secs(30));
    ///
    /// parent.cancel();
    /// assert!(child.is_cancelled());
    /// ```
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let child = self.child();
        child.spawn_timer(timeout);
        child
    }

    /// Arms a timer thread that cancels this token when `timeout` elapses,
    /// unless the token is cancelled first.
    fn spawn_timer(&self, timeout: Duration) {
        let token = self.clone();
        let done = self.done_channel();
        std::thread::spawn(move || {
            crossbeam::channel::select! {
                recv(done) -> _ => {}
                recv(crossbeam::channel::after(timeout)) -> _ => {
                    token.cancel_with_reason(CancellationReason::Timeout(timeout));
                }
            }
        });
    }

    /// Cancel this token with default reason (Manual)
    ///
    /// This operation is idempotent. Only the first call sets the reason and
    /// wakes waiters.
    pub fn cancel(&self) {
        self.cancel_with_reason(CancellationReason::Manual);
    }

    /// Cancel this token with a specific reason
    ///
    /// Cancels the token and all child tokens and wakes every thread blocked
    /// on the done channel. The reason is only set on the first cancellation;
    /// subsequent calls are no-ops.
    ///
    /// # Example
    ///
    /// ```rust
    /// use paced_pool::{CancellationToken, CancellationReason};
    /// use std::time::Duration;
    ///
    /// let token = CancellationToken::new();
    /// token.cancel_with_reason(CancellationReason::Timeout(Duration::from_secs(1)));
    ///
    /// assert!(token.is_cancelled());
    /// assert_eq!(token.reason(), Some(CancellationReason::Timeout(Duration::from_secs(1))));
    /// ```
    pub fn cancel_with_reason(&self, reason: CancellationReason) {
        // Set cancelled flag - if already cancelled, return early
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        // Record reason
        *self.inner.reason.write() = Some(reason);

        // Dropping the sender disconnects every done-channel receiver,
        // waking all blocked waiters at once.
        drop(self.inner.done_tx.lock().take());

        // Cancel all children
        let children = self.inner.children.read();
        for child_weak in children.iter() {
            if let Some(child_inner) = child_weak.upgrade() {
                let child_token = CancellationToken { inner: child_inner };
                child_token.cancel_with_reason(CancellationReason::ParentCancelled);
            }
        }
    }

    /// Check if this token has been cancelled
    ///
    /// This is a lock-free operation suitable for frequent checking
    /// in hot loops.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns a receiver that disconnects when the token is cancelled
    ///
    /// No message is ever sent through this channel; its only observable
    /// event is disconnection. Use it as an extra arm in
    /// `crossbeam::channel::select!` to make any blocking wait
    /// cancellation-aware:
    ///
    /// ```rust
    /// use paced_pool::CancellationToken;
    /// use crossbeam::channel;
    /// use std::time::Duration;
    ///
    /// let token = CancellationToken::new();
    /// token.cancel();
    ///
    /// channel::select! {
    ///     recv(token.done_channel()) -> _ => { /* cancelled */ }
    ///     recv(channel::after(Duration::from_secs(5))) -> _ => {
    ///         panic!("timer should not win against a cancelled token");
    ///     }
    /// }
    /// ```
    pub fn done_channel(&self) -> Receiver<Infallible> {
        self.inner.done_rx.clone()
    }

    /// Blocks the calling thread until the token is cancelled
    pub fn wait(&self) {
        // The only way recv returns is disconnection, i.e. cancellation.
        let _ = self.inner.done_rx.recv();
    }

    /// Blocks until the token is cancelled or the timeout elapses
    ///
    /// Returns `true` if the token was cancelled, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Ok(never) => match never {},
        }
    }

    /// Returns the cancellation reason (if cancelled)
    ///
    /// Returns `None` if the token has not been cancelled.
    pub fn reason(&self) -> Option<CancellationReason> {
        self.inner.reason.read().clone()
    }

    /// Returns an error if cancelled, `Ok(())` otherwise
    ///
    /// This is a convenience method for ergonomic early returns in job
    /// implementations using the `?` operator.
    ///
    /// # Example
    ///
    /// ```rust
    /// use paced_pool::{CancellationToken, PoolError};
    ///
    /// fn process_items(token: &CancellationToken) -> Result<(), PoolError> {
    ///     for _i in 0..100 {
    ///         token.check()?; // Returns early if cancelled
    ///         // Do work...
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            let reason_str = self
                .reason()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Err(PoolError::cancelled(reason_str))
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::TryRecvError;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_cancellation_token_creation() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
    }

    #[test]
    fn test_cancellation_token_cancel() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        token.cancel();
        assert!(token.is_cancelled());

        // Idempotent - can call multiple times
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_clone() {
        let token = CancellationToken::new();
        let clone = token.clone();

        assert!(!token.is_cancelled());
        assert!(!clone.is_cancelled());

        // Cancelling one affects both
        token.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_done_channel_blocks_until_cancel() {
        let token = CancellationToken::new();
        let done = token.done_channel();

        assert_eq!(done.try_recv(), Err(TryRecvError::Empty));

        token.cancel();
        assert_eq!(done.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[test]
    fn test_done_channel_wakes_blocked_receiver() {
        let token = CancellationToken::new();
        let done = token.done_channel();

        let handle = thread::spawn(move || {
            // Blocks until the sender is dropped by cancel()
            done.recv().is_err()
        });

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_done_channel_in_select() {
        let token = CancellationToken::new();
        token.cancel();

        crossbeam::channel::select! {
            recv(token.done_channel()) -> _ => {}
            recv(crossbeam::channel::after(Duration::from_secs(5))) -> _ => {
                panic!("timer should not win against a cancelled token");
            }
        }
    }

    #[test]
    fn test_wait_unblocks_on_cancel() {
        let token = CancellationToken::new();
        let token_clone = token.clone();

        let start = Instant::now();
        let handle = thread::spawn(move || {
            token_clone.wait();
        });

        thread::sleep(Duration::from_millis(50));
        token.cancel();
        handle.join().unwrap();

        // Woke promptly after the cancel, not after some polling interval
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_timeout() {
        let token = CancellationToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(20)));

        token.cancel();
        assert!(token.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_many_waiters_all_wake() {
        let token = CancellationToken::new();
        let mut handles = vec![];

        for _ in 0..10 {
            let token_clone = token.clone();
            handles.push(thread::spawn(move || {
                token_clone.wait();
            }));
        }

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    // ============================================
    // Hierarchical Cancellation Token Tests
    // ============================================

    #[test]
    fn test_child_token_basic() {
        let parent = CancellationToken::new();
        let child = parent.child();

        assert!(!parent.is_cancelled());
        assert!(!child.is_cancelled());

        parent.cancel();
        assert!(parent.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_token_multiple_children() {
        let parent = CancellationToken::new();
        let child1 = parent.child();
        let child2 = parent.child();
        let child3 = parent.child();

        parent.cancel();

        assert!(child1.is_cancelled());
        assert!(child2.is_cancelled());
        assert!(child3.is_cancelled());
    }

    #[test]
    fn test_child_token_independent_cancellation() {
        let parent = CancellationToken::new();
        let child1 = parent.child();
        let child2 = parent.child();

        // Cancelling one child doesn't affect parent or siblings
        child1.cancel();

        assert!(!parent.is_cancelled());
        assert!(child1.is_cancelled());
        assert!(!child2.is_cancelled());
    }

    #[test]
    fn test_child_token_nested_hierarchy() {
        let grandparent = CancellationToken::new();
        let parent = grandparent.child();
        let child = parent.child();

        grandparent.cancel();

        assert!(grandparent.is_cancelled());
        assert!(parent.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_of_already_cancelled_parent() {
        let parent = CancellationToken::new();
        parent.cancel();

        let child = parent.child();
        assert!(child.is_cancelled());
        assert_eq!(child.reason(), Some(CancellationReason::ParentCancelled));
    }

    #[test]
    fn test_child_done_channel_disconnects_on_parent_cancel() {
        let parent = CancellationToken::new();
        let child = parent.child();
        let done = child.done_channel();

        parent.cancel();
        assert_eq!(done.try_recv(), Err(TryRecvError::Disconnected));
    }

    // ============================================
    // Timeout Cancellation Tests
    // ============================================

    #[test]
    fn test_with_timeout_basic() {
        let token = CancellationToken::with_timeout(Duration::from_millis(50));
        assert!(!token.is_cancelled());

        // wait() observes the timer firing without polling
        token.wait();
        assert!(token.is_cancelled());
        assert_eq!(
            token.reason(),
            Some(CancellationReason::Timeout(Duration::from_millis(50)))
        );
    }

    #[test]
    fn test_with_timeout_manual_cancel_before_timeout() {
        let token = CancellationToken::with_timeout(Duration::from_secs(10));

        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancellationReason::Manual));
    }

    #[test]
    fn test_child_with_timeout_basic() {
        let parent = CancellationToken::new();
        let child = parent.child_with_timeout(Duration::from_millis(50));

        assert!(!child.is_cancelled());

        child.wait();
        assert!(child.is_cancelled());
        assert_eq!(
            child.reason(),
            Some(CancellationReason::Timeout(Duration::from_millis(50)))
        );

        // Parent should not be affected
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_child_with_timeout_parent_cancels_first() {
        let parent = CancellationToken::new();
        let child = parent.child_with_timeout(Duration::from_secs(10));

        parent.cancel();

        assert!(child.is_cancelled());
        assert_eq!(child.reason(), Some(CancellationReason::ParentCancelled));
    }

    // ============================================
    // Cancellation Reason Tests
    // ============================================

    #[test]
    fn test_cancel_reason_first_wins() {
        let token = CancellationToken::new();

        token.cancel_with_reason(CancellationReason::Manual);

        // Second cancellation is a no-op
        token.cancel_with_reason(CancellationReason::Timeout(Duration::from_secs(1)));

        assert_eq!(token.reason(), Some(CancellationReason::Manual));
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(CancellationReason::Manual.to_string(), "manually cancelled");
        assert_eq!(
            CancellationReason::Timeout(Duration::from_secs(5)).to_string(),
            "timeout after 5s"
        );
        assert_eq!(
            CancellationReason::ParentCancelled.to_string(),
            "parent was cancelled"
        );
    }

    #[test]
    fn test_cancelled_marker_display() {
        assert_eq!(Cancelled.to_string(), "operation cancelled");
    }

    // ============================================
    // Check Method Tests
    // ============================================

    #[test]
    fn test_check_not_cancelled() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_check_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.check().is_err());
    }

    #[test]
    fn test_check_error_contains_reason() {
        let token = CancellationToken::new();
        token.cancel_with_reason(CancellationReason::ParentCancelled);

        let err = token.check().unwrap_err();
        assert!(err.to_string().contains("parent was cancelled"));
    }

    // ============================================
    // Thread Safety Tests
    // ============================================

    #[test]
    fn test_concurrent_child_creation() {
        let parent = CancellationToken::new();
        let mut handles = vec![];

        for _ in 0..10 {
            let parent_clone = parent.clone();
            let handle = thread::spawn(move || {
                let _child = parent_clone.child();
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        parent.cancel();
        assert!(parent.is_cancelled());
    }

    #[test]
    fn test_concurrent_cancellation() {
        let token = CancellationToken::new();
        let mut handles = vec![];

        for _ in 0..10 {
            let token_clone = token.clone();
            handles.push(thread::spawn(move || {
                token_clone.cancel();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // Exactly one cancel won; the reason is set and the token fired
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancellationReason::Manual));
    }
}
