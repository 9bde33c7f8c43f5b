//! Cancellation example
//!
//! Demonstrates hierarchical cancellation: a parent token shuts down the
//! pool mid-backlog, and a deadline token does the same automatically.
//!
//! Run with: cargo run --example cancellation
//! Set RUST_LOG=debug to watch the pool's internal lifecycle logging.

use paced_pool::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Paced Pool - Cancellation Example ===\n");

    // ------------------------------------------------------------------
    // Part 1: manual cancellation through the parent token
    // ------------------------------------------------------------------

    let parent = CancellationToken::new();
    let pool = WorkerPool::new(&parent, 5, 5)?;

    println!("1. Submitting 50 jobs at 5 starts/s (~10s of work):");

    let completed = Arc::new(AtomicUsize::new(0));
    for i in 0..50 {
        let completed = Arc::clone(&completed);
        pool.execute(move || {
            println!("  Job {} ran", i);
            completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    println!("   Letting it run for one second...\n");
    thread::sleep(Duration::from_secs(1));

    println!("\n2. Cancelling the parent token:");
    let cancel_at = Instant::now();
    parent.cancel();
    pool.shutdown()?;

    println!("   Shutdown returned in {:?}", cancel_at.elapsed());
    println!(
        "   {} of 50 jobs ran; the rest were discarded",
        completed.load(Ordering::SeqCst)
    );
    println!("   Pool cancelled: {}", pool.is_cancelled());

    // ------------------------------------------------------------------
    // Part 2: deadline cancellation
    // ------------------------------------------------------------------

    println!("\n3. A pool under a 500ms deadline token:");

    let deadline = CancellationToken::with_timeout(Duration::from_millis(500));
    let timed_pool = WorkerPool::new(&deadline, 2, 4)?;

    let ran = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let ran = Arc::clone(&ran);
        timed_pool.execute(move || {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    // Block until the timer fires, then observe the recorded reason
    deadline.wait();
    timed_pool.shutdown()?;

    println!("   Deadline fired; {} of 20 jobs ran", ran.load(Ordering::SeqCst));
    match deadline.reason() {
        Some(reason) => println!("   Recorded reason: {}", reason),
        None => println!("   Recorded reason: none"),
    }

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
