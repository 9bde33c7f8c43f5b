//! Comprehensive tests for pool cancellation

use paced_pool::prelude::*;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_cancel_discards_pending_jobs() {
    let parent = CancellationToken::new();
    let pool = WorkerPool::new(&parent, 5, 10).expect("Failed to create worker pool");

    let started = Arc::new(AtomicU64::new(0));
    let completed = Arc::new(AtomicU64::new(0));

    for _ in 0..100 {
        let started = Arc::clone(&started);
        let completed = Arc::clone(&completed);
        pool.execute(move || {
            started.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    // Give the limiter time to release a couple of jobs, then pull the plug.
    thread::sleep(Duration::from_millis(150));
    let cancelled_at = Instant::now();
    pool.cancel();
    pool.shutdown().expect("Shutdown failed");

    // Teardown must not wait out the remaining backlog at 10 jobs/s.
    assert!(
        cancelled_at.elapsed() < Duration::from_secs(1),
        "shutdown after cancel took {:?}",
        cancelled_at.elapsed()
    );

    let started = started.load(Ordering::SeqCst);
    let completed = completed.load(Ordering::SeqCst);
    assert!(started <= 5, "limiter released {} jobs in 150ms", started);
    assert_eq!(started, completed, "a running job was abandoned mid-flight");
    assert_eq!(pool.actor_count(), 0);

    // At most the one job in the dispatcher's hands is dropped there; the
    // rest of the backlog evaporates with the queue.
    assert!(pool.jobs_discarded() <= 1);
}

#[test]
fn test_in_flight_jobs_run_to_completion() {
    let parent = CancellationToken::new();
    let pool = WorkerPool::new(&parent, 2, 1_000).expect("Failed to create worker pool");

    let finished = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let finished = Arc::clone(&finished);
        pool.execute(move || {
            thread::sleep(Duration::from_millis(300));
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    for _ in 0..20 {
        pool.execute(|| Ok(()));
    }

    // Both workers are busy with the long jobs when the signal fires.
    thread::sleep(Duration::from_millis(100));
    pool.cancel();
    pool.shutdown().expect("Shutdown failed");

    assert_eq!(
        finished.load(Ordering::SeqCst),
        2,
        "jobs already running must finish"
    );
    // None of the short jobs behind them ever started.
    assert_eq!(pool.total_jobs_processed(), 2);
}

#[test]
fn test_parent_token_cancels_the_pool() {
    let parent = CancellationToken::new();
    let pool = WorkerPool::new(&parent, 2, 1_000).expect("Failed to create worker pool");

    assert!(!pool.is_cancelled());
    parent.cancel();
    assert!(pool.is_cancelled());
    assert!(!pool.is_running());

    // The rejection carries the reason recorded on the token.
    let err = pool
        .try_execute(|| Ok(()))
        .expect_err("submission should be rejected after parent cancel");
    assert!(matches!(err, PoolError::Cancelled { .. }));
    assert!(err.to_string().contains("parent was cancelled"));

    pool.shutdown().expect("Shutdown failed");
    assert_eq!(pool.actor_count(), 0);
}

#[test]
fn test_one_parent_cancels_every_pool() {
    let parent = CancellationToken::new();
    let first = WorkerPool::new(&parent, 2, 1_000).expect("Failed to create first pool");
    let second = WorkerPool::new(&parent, 2, 1_000).expect("Failed to create second pool");

    parent.cancel();

    assert!(first.is_cancelled());
    assert!(second.is_cancelled());

    first.shutdown().expect("First shutdown failed");
    second.shutdown().expect("Second shutdown failed");
}

#[test]
fn test_pool_cancel_leaves_parent_and_siblings_untouched() {
    let parent = CancellationToken::new();
    let doomed = WorkerPool::new(&parent, 2, 1_000).expect("Failed to create doomed pool");
    let survivor = WorkerPool::new(&parent, 2, 1_000).expect("Failed to create surviving pool");

    doomed.cancel();

    assert!(!parent.is_cancelled());
    assert!(!survivor.is_cancelled());

    // The sibling keeps processing as if nothing happened.
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let counter = Arc::clone(&counter);
        survivor.execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    survivor.shutdown().expect("Survivor shutdown failed");
    doomed.shutdown().expect("Doomed shutdown failed");
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

#[test]
fn test_deadline_token_cancels_the_pool() {
    let parent = CancellationToken::with_timeout(Duration::from_millis(150));
    let pool = WorkerPool::new(&parent, 2, 5).expect("Failed to create worker pool");

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..50 {
        let counter = Arc::clone(&counter);
        pool.execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    // Block until the deadline fires, then confirm the pool shut itself off.
    parent.wait();
    assert_eq!(
        parent.reason(),
        Some(CancellationReason::Timeout(Duration::from_millis(150)))
    );
    assert!(pool.is_cancelled());

    let start = Instant::now();
    pool.shutdown().expect("Shutdown failed");
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "shutdown after deadline took {:?}",
        start.elapsed()
    );

    // At 5 jobs/s almost the whole backlog was still queued at the deadline.
    assert!(counter.load(Ordering::SeqCst) < 50);
}

#[test]
fn test_blocked_submitter_wakes_on_cancel() {
    let parent = CancellationToken::new();
    let config = PoolConfig::new(1, 1).with_queue_capacity(1);
    let pool = Arc::new(WorkerPool::with_config(&parent, config).expect("Failed to create pool"));

    let submitter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            // At 1 job/s nothing drains, so a later send parks on the
            // full queue until the signal wakes it.
            for _ in 0..4 {
                pool.execute(|| Ok(()));
            }
        })
    };

    thread::sleep(Duration::from_millis(100));
    let start = Instant::now();
    pool.cancel();

    submitter.join().expect("Submitter thread panicked");
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "blocked submitter woke after {:?}",
        start.elapsed()
    );

    pool.shutdown().expect("Shutdown failed");
}

#[test]
fn test_submissions_after_cancel_are_rejected() {
    let parent = CancellationToken::new();
    let pool = WorkerPool::new(&parent, 2, 1_000).expect("Failed to create worker pool");

    pool.cancel();

    // Fire-and-forget drops silently; nothing is counted as submitted.
    pool.execute(|| Ok(()));
    assert_eq!(pool.total_jobs_submitted(), 0);

    let result = pool.try_execute(|| Ok(()));
    assert!(matches!(result, Err(PoolError::Cancelled { .. })));

    pool.shutdown().expect("Shutdown failed");
}

#[test]
fn test_drop_after_cancel_returns_promptly() {
    let parent = CancellationToken::new();
    let start;
    {
        let pool = WorkerPool::new(&parent, 2, 1).expect("Failed to create worker pool");
        for _ in 0..100 {
            pool.execute(|| Ok(()));
        }
        pool.cancel();
        start = Instant::now();
    }

    // Drop runs shutdown; with the signal fired it must not drain 100
    // jobs at 1 job/s.
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "drop waited out the backlog: {:?}",
        start.elapsed()
    );
}

#[test]
fn test_cancel_is_idempotent_across_pool_and_token() {
    let parent = CancellationToken::new();
    let pool = WorkerPool::new(&parent, 2, 1_000).expect("Failed to create worker pool");

    pool.cancel();
    pool.cancel();
    pool.cancellation_token().cancel();

    assert!(pool.is_cancelled());
    pool.shutdown().expect("Shutdown failed");
    assert_eq!(pool.actor_count(), 0);
}
