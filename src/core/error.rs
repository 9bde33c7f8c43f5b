//! Error types for the worker pool

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur in the worker pool
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Failed to spawn a background actor thread
    #[error("Failed to spawn {actor} thread")]
    Spawn {
        /// Name of the actor that failed to spawn
        actor: String,
        /// Source IO error
        #[source]
        source: std::io::Error,
    },

    /// Failed to join a background actor thread
    #[error("Failed to join {actor} thread: {message}")]
    Join {
        /// Name of the actor that failed to join
        actor: String,
        /// Error message
        message: String,
    },

    /// Submission queue is full
    #[error("Submission queue is full ({capacity} jobs queued)")]
    QueueFull {
        /// Queue capacity
        capacity: usize,
    },

    /// Pool is shutting down and no longer accepts jobs
    #[error("Pool is shutting down")]
    ShuttingDown,

    /// Job submission timed out waiting for queue space
    #[error("Job submission timed out after {timeout_ms}ms")]
    SubmissionTimeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Operation was interrupted by cancellation
    #[error("Cancelled: {reason}")]
    Cancelled {
        /// Reason for cancellation
        reason: String,
    },

    /// Job execution failed
    #[error("Job execution failed: {message}")]
    Execution {
        /// Error message
        message: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl PoolError {
    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a spawn error
    pub fn spawn(actor: impl Into<String>, source: std::io::Error) -> Self {
        PoolError::Spawn {
            actor: actor.into(),
            source,
        }
    }

    /// Create a join error
    pub fn join(actor: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::Join {
            actor: actor.into(),
            message: message.into(),
        }
    }

    /// Create a queue full error
    pub fn queue_full(capacity: usize) -> Self {
        PoolError::QueueFull { capacity }
    }

    /// Create a submission timeout error
    pub fn submission_timeout(timeout_ms: u64) -> Self {
        PoolError::SubmissionTimeout { timeout_ms }
    }

    /// Create a cancelled error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        PoolError::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        PoolError::Execution {
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PoolError::Other(msg.into())
    }
}
