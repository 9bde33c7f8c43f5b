//! Rate limiting example
//!
//! Shows that job starts are paced by the token bucket regardless of how
//! fast jobs are submitted or how long they run.
//!
//! Run with: cargo run --example pacing

use paced_pool::prelude::*;
use rand::Rng;
use std::time::Instant;

fn main() -> Result<()> {
    println!("=== Paced Pool - Rate Limiting Example ===\n");

    let parent = CancellationToken::new();

    // Plenty of workers; the 5/s limiter is the only bottleneck.
    let pool = WorkerPool::new(&parent, 4, 5)?;

    println!(
        "1. Started pool: {} workers, {} job starts/s",
        pool.worker_count(),
        pool.rate_per_second()
    );

    println!("\n2. Submitting 15 jobs in one burst:");

    let start = Instant::now();
    for i in 0..15 {
        pool.execute(move || {
            let began = start.elapsed().as_millis();

            // Jobs take a variable amount of time; start spacing stays fixed
            let work_ms = rand::thread_rng().gen_range(10..80);
            std::thread::sleep(std::time::Duration::from_millis(work_ms));

            println!("  [{:>5}ms] job {:>2} started, worked {}ms", began, i, work_ms);
            Ok(())
        });
    }

    println!("   All 15 submitted immediately; watch the ~200ms spacing:\n");

    pool.shutdown()?;
    let elapsed = start.elapsed();

    println!("\n3. Drained 15 jobs in {:?}", elapsed);
    println!(
        "   Effective rate: {:.1} jobs/s (configured {})",
        15.0 / elapsed.as_secs_f64(),
        pool.rate_per_second()
    );

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
