//! Token-bucket rate limiter with lazy refill and cancellable waits

use crate::core::{CancellationToken, Cancelled};
use crossbeam::channel;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Mutable bucket counters, guarded by a single exclusive lock
struct BucketState {
    /// Currently available tokens; always within `0.0..=max_tokens`
    tokens: f64,
    /// Instant of the last lazy refill
    last_refill: Instant,
}

/// A token-bucket rate limiter
///
/// Capacity accrues continuously at `rate_per_second` tokens per second, up
/// to a cap of one second's worth of tokens. Each unit of work consumes one
/// token. A new bucket starts empty, so the very first token becomes
/// available `1 / rate` seconds after creation; burst capacity is only what
/// has accrued during idle periods.
///
/// Refill is computed lazily on every access (`elapsed x rate`, capped), so
/// no background ticking thread is needed. The internal lock is held only
/// while the counters are inspected and updated, never while a caller is
/// suspended waiting for capacity.
///
/// # Example
///
/// ```rust
/// use paced_pool::TokenBucket;
///
/// let bucket = TokenBucket::new(100);
/// assert_eq!(bucket.max_tokens(), 100.0);
///
/// // A fresh bucket has no tokens yet
/// assert!(!bucket.try_acquire());
/// ```
pub struct TokenBucket {
    rate_per_second: f64,
    max_tokens: f64,
    state: Mutex<BucketState>,
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("rate_per_second", &self.rate_per_second)
            .field("max_tokens", &self.max_tokens)
            .field("tokens", &self.state.lock().tokens)
            .finish()
    }
}

impl TokenBucket {
    /// Create a bucket generating `rate_per_second` tokens per second
    ///
    /// The burst cap equals one second of capacity (`max_tokens ==
    /// rate_per_second`). Rates below one token per second are clamped to 1;
    /// callers that need to reject such rates outright validate before
    /// construction (as [`PoolConfig`](crate::PoolConfig) does).
    pub fn new(rate_per_second: u32) -> Self {
        let rate = f64::from(rate_per_second.max(1));
        Self {
            rate_per_second: rate,
            max_tokens: rate,
            state: Mutex::new(BucketState {
                tokens: 0.0,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token, blocking until one is available or `signal` fires
    ///
    /// Returns `Ok(())` once a token has been consumed. Returns
    /// `Err(Cancelled)` if the signal fires first; no token is consumed in
    /// that case. Cancellation wins over available capacity: a fired signal
    /// is observed before the bucket is inspected.
    ///
    /// While suspended the caller holds no lock, so concurrent callers can
    /// refill and consume freely; after every timer elapse the state is
    /// re-evaluated from scratch because a racing caller may have taken the
    /// token this caller was waiting for.
    pub fn acquire(&self, signal: &CancellationToken) -> Result<(), Cancelled> {
        let done = signal.done_channel();
        loop {
            if signal.is_cancelled() {
                return Err(Cancelled);
            }

            let wait = {
                let mut state = self.state.lock();
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                // Time until exactly one token has accumulated.
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate_per_second)
            };

            channel::select! {
                recv(channel::after(wait)) -> _ => {}
                recv(done) -> _ => return Err(Cancelled),
            }
        }
    }

    /// Take one token without blocking
    ///
    /// Returns `true` if a token was consumed, `false` if the bucket is
    /// (still) below one token.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens generated per second
    pub fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    /// Burst cap (one second of capacity)
    pub fn max_tokens(&self) -> f64 {
        self.max_tokens
    }

    /// Refreshes and reports the currently available tokens
    ///
    /// The value is approximate the moment it is returned; it is meant for
    /// diagnostics and tests, not for acquire decisions.
    pub fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_second).min(self.max_tokens);
        state.last_refill = now;
    }
}
