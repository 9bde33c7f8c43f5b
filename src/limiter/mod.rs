//! Token-bucket rate limiting
//!
//! The pool throttles aggregate throughput through a single shared
//! [`TokenBucket`]: the dispatcher takes one token per job before handing it
//! to the workers, so the long-run execution rate never exceeds the
//! configured tokens per second.

pub mod token_bucket;

pub use token_bucket::TokenBucket;
