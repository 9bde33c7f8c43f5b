//! Tracing integration
//!
//! Propagates `tracing` spans from the submitting thread into the worker
//! that eventually executes the job. Enabled with the `tracing` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use paced_pool::prelude::*;
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("paced_pool=debug".parse().unwrap()))
//!     .init();
//!
//! let signal = CancellationToken::new();
//! let pool = WorkerPool::new(&signal, 4, 100)?;
//!
//! // Submit with tracing context propagation
//! pool.submit_traced(MyJob::new());
//! ```

use crate::core::{Job, Result};

/// A job wrapper that propagates tracing context across thread boundaries
///
/// The current span is captured at submission time and entered when the job
/// executes, so events emitted by the job land under the submitter's span
/// even though a worker thread runs it.
pub struct TracedJob<J: Job> {
    inner: J,
    span: tracing::Span,
}

impl<J: Job> TracedJob<J> {
    /// Wraps `job`, capturing the current span
    pub fn new(job: J) -> Self {
        Self {
            inner: job,
            span: tracing::Span::current(),
        }
    }

    /// Wraps `job` with a specific span
    pub fn with_span(job: J, span: tracing::Span) -> Self {
        Self { inner: job, span }
    }
}

impl<J: Job> Job for TracedJob<J> {
    fn execute(&mut self) -> Result<()> {
        let _guard = self.span.enter();
        self.inner.execute()
    }

    fn job_type(&self) -> &str {
        self.inner.job_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ClosureJob;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_traced_job_executes() {
        let executed = Arc::new(AtomicBool::new(false));
        let executed_clone = Arc::clone(&executed);

        let job = ClosureJob::new(move || {
            executed_clone.store(true, Ordering::SeqCst);
            Ok(())
        });

        let mut traced = TracedJob::new(job);
        traced.execute().expect("job should execute");

        assert!(executed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_traced_job_preserves_job_type() {
        let job = ClosureJob::new(|| Ok(()));
        let traced = TracedJob::new(job);

        assert_eq!(traced.job_type(), "ClosureJob");
    }
}
