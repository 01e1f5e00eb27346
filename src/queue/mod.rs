//! Job queue abstraction consumed by the latency prober.
//!
//! The prober only relies on a submit / poll-by-id contract. [`ComfyUiClient`]
//! is the HTTP implementation; tests substitute in-process fakes.

pub mod comfyui;

pub use comfyui::ComfyUiClient;

use crate::error::Result;
use crate::workload::WorkUnit;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier returned by the queue on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a submitted job as reported by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued or running.
    Pending,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed(String),
}

/// A remote queue that accepts work units and reports their completion.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit one unit and return its polling key.
    ///
    /// Transport failures must map to [`BenchError::QueueUnavailable`](crate::BenchError::QueueUnavailable).
    async fn submit(&self, unit: &WorkUnit) -> Result<JobHandle>;

    /// Query the current status of a submitted job.
    async fn status(&self, handle: &JobHandle) -> Result<JobStatus>;
}
