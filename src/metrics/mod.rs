//! Metrics sources consumed by the resource sampler.
//!
//! Host CPU/RAM readings come from a [`HostMetrics`] implementation. GPU
//! readings are optional: [`GpuCapability`] is decided once when the sampler
//! is built and owned by it for the whole run. It is never re-detected and
//! never held in process-wide state.

mod host;
#[cfg(feature = "nvml")]
mod nvml;

pub use host::{SysinfoHost, effective_cpu_window};
#[cfg(feature = "nvml")]
pub use nvml::NvmlGpu;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Host CPU and memory readings.
pub trait HostMetrics: Send {
    /// CPU utilisation in percent, measured over `window`.
    ///
    /// Blocks the calling thread for roughly `window`.
    fn cpu_percent(&mut self, window: Duration) -> f64;

    /// Used physical memory in percent of total.
    fn ram_percent(&mut self) -> f64;
}

/// One GPU reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpuReading {
    pub utilization_percent: f64,
    pub memory_used_percent: f64,
}

/// An opened GPU device.
pub trait GpuSource: Send {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Best-effort reading. Failures are per call and do not close the source.
    fn read(&mut self) -> Result<GpuReading>;
}

/// Whether GPU sampling is available for this run.
pub enum GpuCapability {
    /// No usable GPU source; `reason` explains why.
    Absent { reason: String },
    /// An opened device.
    Present(Box<dyn GpuSource>),
}

impl GpuCapability {
    /// Try `open` exactly once and keep the outcome for the run.
    ///
    /// An open failure is logged as degraded operation, not returned.
    pub fn detect<F>(open: F) -> Self
    where
        F: FnOnce() -> Result<Box<dyn GpuSource>>,
    {
        match open() {
            Ok(source) => {
                info!(device = source.name(), "GPU metrics source detected");
                Self::Present(source)
            }
            Err(e) => {
                warn!(error = %e, "GPU metrics unavailable, sampling CPU and RAM only");
                Self::Absent {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Detect the platform GPU source (NVML device 0 when built with `nvml`).
    pub fn detect_default() -> Self {
        Self::detect(open_default_gpu)
    }

    /// No GPU sampling.
    pub fn absent(reason: impl Into<String>) -> Self {
        Self::Absent {
            reason: reason.into(),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Device name when present.
    pub fn device_name(&self) -> Option<&str> {
        match self {
            Self::Present(source) => Some(source.name()),
            Self::Absent { .. } => None,
        }
    }
}

impl std::fmt::Debug for GpuCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent { reason } => f.debug_struct("Absent").field("reason", reason).finish(),
            Self::Present(source) => f.debug_tuple("Present").field(&source.name()).finish(),
        }
    }
}

#[cfg(feature = "nvml")]
fn open_default_gpu() -> Result<Box<dyn GpuSource>> {
    NvmlGpu::open(0).map(|gpu| Box::new(gpu) as Box<dyn GpuSource>)
}

#[cfg(not(feature = "nvml"))]
fn open_default_gpu() -> Result<Box<dyn GpuSource>> {
    Err(crate::error::BenchError::MetricsSourceUnavailable(
        "built without the `nvml` feature".to_owned(),
    ))
}

/// Convert used/total byte counts to a percentage.
///
/// Returns 0 when `total` is zero.
pub fn used_percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}
