//! Worker pool, dispatcher, and worker implementations

use std::any::Any;

pub mod dispatcher;
pub mod worker;
pub mod worker_pool;

pub use dispatcher::DispatcherStats;
pub use worker::WorkerStats;
pub use worker_pool::{PoolConfig, WorkerPool};

pub(crate) use dispatcher::Dispatcher;
pub(crate) use worker::Worker;

/// Renders a payload caught from a panicking thread or job
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
