//! genprobe: latency and resource benchmark for image-generation job queues.
//!
//! A run drives two workers side by side:
//! - **Latency prober**: submits a sequence of generation jobs to a
//!   ComfyUI-style queue and times each one until the queue reports it done
//! - **Resource sampler**: records host CPU/RAM (and GPU, when available) at
//!   a fixed cadence for a fixed duration
//!
//! [`RunCoordinator`] starts both, waits for both, and merges their results
//! into a [`RunReport`].

pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod prober;
pub mod queue;
pub mod report;
pub mod sampler;
pub mod workload;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{BenchConfig, ProbeParams, SampleParams};
pub use coordinator::{RunCoordinator, RunReport};
pub use error::{BenchError, Result, Worker};
pub use metrics::{GpuCapability, GpuSource, HostMetrics};
pub use prober::{LatencyProber, TimingResult};
pub use queue::{ComfyUiClient, JobHandle, JobQueue, JobStatus};
pub use sampler::{ResourceResult, ResourceSampler};
