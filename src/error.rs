//! Error types for genprobe.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) accessible
//! via [`BenchError::code()`]. Codes are part of the public API contract.

use std::fmt;
use std::time::Duration;

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// The job queue could not be reached.
    pub const QUEUE_UNAVAILABLE: &str = "QUEUE_UNAVAILABLE";

    /// The job queue refused a submission.
    pub const SUBMIT_REJECTED: &str = "SUBMIT_REJECTED";

    /// A submitted job did not finish within its deadline.
    pub const JOB_TIMEOUT: &str = "JOB_TIMEOUT";

    /// A submitted job finished with an error status.
    pub const JOB_FAILED: &str = "JOB_FAILED";

    /// An optional metrics source (GPU) could not be opened.
    pub const METRICS_SOURCE_UNAVAILABLE: &str = "METRICS_SOURCE_UNAVAILABLE";

    /// Run parameters were rejected before anything was started.
    pub const INVALID_CONFIG: &str = "INVALID_CONFIG";

    /// A worker stopped because its cancellation token fired.
    pub const CANCELLED: &str = "CANCELLED";

    /// The overall run deadline expired.
    pub const DEADLINE_EXCEEDED: &str = "DEADLINE_EXCEEDED";

    /// A worker task panicked or was aborted.
    pub const JOIN_FAILED: &str = "JOIN_FAILED";

    /// Configuration file could not be parsed or written.
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";

    /// Filesystem I/O error.
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// The two concurrently scheduled units of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Worker {
    /// Job submission / polling loop.
    Prober,
    /// Host resource sampling loop.
    Sampler,
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prober => f.write_str("latency prober"),
            Self::Sampler => f.write_str("resource sampler"),
        }
    }
}

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Submission or status call could not reach the job queue.
    #[error("[{}] job queue unavailable: {}", error_codes::QUEUE_UNAVAILABLE, .0)]
    QueueUnavailable(String),

    /// The queue answered the submission with a non-success status.
    #[error(
        "[{}] submission rejected (HTTP {}): {}",
        error_codes::SUBMIT_REJECTED,
        .status,
        .message
    )]
    SubmitRejected { status: u16, message: String },

    /// Job was still pending when its deadline expired.
    #[error(
        "[{}] job {} did not complete within {:.1}s",
        error_codes::JOB_TIMEOUT,
        .job_id,
        .waited.as_secs_f64()
    )]
    JobTimeout { job_id: String, waited: Duration },

    /// Job finished with an error status.
    #[error("[{}] job {} failed: {}", error_codes::JOB_FAILED, .job_id, .reason)]
    JobFailed { job_id: String, reason: String },

    /// GPU metrics source could not be initialised.
    #[error("[{}] {}", error_codes::METRICS_SOURCE_UNAVAILABLE, .0)]
    MetricsSourceUnavailable(String),

    /// Rejected run parameters.
    #[error("[{}] {}", error_codes::INVALID_CONFIG, .0)]
    InvalidConfig(String),

    /// Worker observed cancellation.
    #[error("[{}] {} cancelled", error_codes::CANCELLED, .0)]
    Cancelled(Worker),

    /// Overall run deadline expired before both workers finished.
    #[error(
        "[{}] run did not finish within {:.1}s",
        error_codes::DEADLINE_EXCEEDED,
        .0.as_secs_f64()
    )]
    DeadlineExceeded(Duration),

    /// A worker failed; `source` holds the cause.
    #[error("{} failed: {}", .worker, .source)]
    Worker {
        worker: Worker,
        #[source]
        source: Box<BenchError>,
    },

    /// Worker task panicked or was aborted.
    #[error(
        "[{}] {} task did not complete: {}",
        error_codes::JOIN_FAILED,
        .worker,
        .message
    )]
    Join { worker: Worker, message: String },

    /// Configuration file error.
    #[error("[{}] {}", error_codes::CONFIG_ERROR, .0)]
    Config(String),

    /// I/O error.
    #[error("[{}] {}", error_codes::IO_ERROR, .0)]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Returns the stable error code for this error.
    ///
    /// For [`BenchError::Worker`] this is the code of the wrapped cause.
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueueUnavailable(_) => error_codes::QUEUE_UNAVAILABLE,
            Self::SubmitRejected { .. } => error_codes::SUBMIT_REJECTED,
            Self::JobTimeout { .. } => error_codes::JOB_TIMEOUT,
            Self::JobFailed { .. } => error_codes::JOB_FAILED,
            Self::MetricsSourceUnavailable(_) => error_codes::METRICS_SOURCE_UNAVAILABLE,
            Self::InvalidConfig(_) => error_codes::INVALID_CONFIG,
            Self::Cancelled(_) => error_codes::CANCELLED,
            Self::DeadlineExceeded(_) => error_codes::DEADLINE_EXCEEDED,
            Self::Worker { source, .. } => source.code(),
            Self::Join { .. } => error_codes::JOIN_FAILED,
            Self::Config(_) => error_codes::CONFIG_ERROR,
            Self::Io(_) => error_codes::IO_ERROR,
        }
    }

    /// Wrap this error with the worker it came from.
    ///
    /// Errors that already name a worker are returned unchanged.
    pub fn in_worker(self, worker: Worker) -> Self {
        match self {
            Self::Worker { .. } | Self::Join { .. } => self,
            other => Self::Worker {
                worker,
                source: Box::new(other),
            },
        }
    }

    /// The failed worker, if this error is attributed to one.
    pub fn worker(&self) -> Option<Worker> {
        match self {
            Self::Worker { worker, .. } | Self::Join { worker, .. } => Some(*worker),
            Self::Cancelled(worker) => Some(*worker),
            _ => None,
        }
    }

    /// The innermost cause, unwrapping any [`BenchError::Worker`] layer.
    pub fn root(&self) -> &BenchError {
        match self {
            Self::Worker { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BenchError>;
