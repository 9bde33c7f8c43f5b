//! Basic worker pool usage example
//!
//! Demonstrates pool creation, paced job submission, and statistics tracking.
//!
//! Run with: cargo run --example basic_usage

use paced_pool::prelude::*;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    println!("=== Paced Pool - Basic Usage Example ===\n");

    // Every pool hangs off a cancellation token; this example never fires it.
    let parent = CancellationToken::new();

    // Four workers, but the limiter releases at most 10 job starts per second
    let pool = WorkerPool::new(&parent, 4, 10)?;

    println!(
        "1. Started pool: {} workers, {} job starts/s, queue capacity {}",
        pool.worker_count(),
        pool.rate_per_second(),
        pool.queue_capacity()
    );

    println!("\n2. Submitting 10 jobs:");

    let start = Instant::now();
    for i in 0..10 {
        pool.execute(move || {
            println!(
                "  Job {} executing on {:?}",
                i,
                thread::current().name().unwrap_or("worker")
            );
            Ok(())
        });
    }

    println!("   Submitted 10 jobs; the limiter spaces their starts ~100ms apart");

    // Let roughly half the backlog through before peeking at the counters
    thread::sleep(Duration::from_millis(500));

    println!("\n3. Mid-flight statistics:");
    println!("   Jobs submitted: {}", pool.total_jobs_submitted());
    println!("   Jobs processed: {}", pool.total_jobs_processed());
    println!("   Queue depth:    {}", pool.queue_depth());

    // Graceful shutdown drains the rest before joining the threads
    println!("\n4. Shutting down (drains the remaining jobs)...");
    pool.shutdown()?;
    let elapsed = start.elapsed();

    println!("\n5. Final statistics after {:?}:", elapsed);
    println!("   Jobs submitted: {}", pool.total_jobs_submitted());
    println!("   Jobs processed: {}", pool.total_jobs_processed());
    println!("   Jobs failed:    {}", pool.total_jobs_failed());

    println!("\n6. Per-worker statistics:");
    for (i, stat) in pool.worker_stats().iter().enumerate() {
        println!(
            "   Worker {}: {} processed, {} failed, avg time: {:.2}us",
            i,
            stat.get_jobs_processed(),
            stat.get_jobs_failed(),
            stat.get_average_processing_time_us()
        );
    }

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
