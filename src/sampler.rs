//! Resource sampler: fixed-cadence CPU/RAM/GPU snapshots for a fixed duration.
//!
//! The sampler is synchronous and meant to run on a blocking thread. CPU
//! utilisation is measured over a short blocking window that counts toward
//! the interval, so the sleep after each capture only covers what is left of
//! it. The loop ends once `duration` has elapsed since the first capture.

use crate::config::SampleParams;
use crate::error::{BenchError, Result, Worker};
use crate::metrics::{GpuCapability, GpuReading, HostMetrics, SysinfoHost};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Upper bound on a single uninterrupted sleep, so cancellation is noticed.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(25);

/// One point-in-time reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Capture time relative to sampler start.
    pub offset: Duration,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    /// Present only when the GPU was detected and this read succeeded.
    pub gpu: Option<GpuReading>,
}

/// Mean and maximum of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub avg: f64,
    pub max: f64,
}

impl MetricSummary {
    /// Summarise `values`; `None` when empty.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0_usize;
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            max = max.max(v);
        }
        (count > 0).then(|| Self {
            avg: sum / count as f64,
            max,
        })
    }
}

/// GPU aggregate, present only if at least one GPU reading succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuSummary {
    pub name: String,
    pub avg_usage: f64,
    pub max_usage: f64,
    pub avg_memory: f64,
    pub max_memory: f64,
}

/// Aggregate over all snapshots of a sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceResult {
    /// Snapshots in capture order.
    pub snapshots: Vec<ResourceSnapshot>,
    /// Wall time from sampler start to loop exit.
    pub span: Duration,
    pub cpu: MetricSummary,
    pub ram: MetricSummary,
    pub gpu: Option<GpuSummary>,
}

impl ResourceResult {
    /// Summarise captured snapshots; `None` when there are none.
    pub fn from_snapshots(
        snapshots: Vec<ResourceSnapshot>,
        span: Duration,
        gpu_name: Option<&str>,
    ) -> Option<Self> {
        let cpu = MetricSummary::from_values(snapshots.iter().map(|s| s.cpu_percent))?;
        let ram = MetricSummary::from_values(snapshots.iter().map(|s| s.ram_percent))?;

        let gpu = gpu_name.and_then(|name| {
            let readings: Vec<GpuReading> = snapshots.iter().filter_map(|s| s.gpu).collect();
            let usage =
                MetricSummary::from_values(readings.iter().map(|r| r.utilization_percent))?;
            let memory =
                MetricSummary::from_values(readings.iter().map(|r| r.memory_used_percent))?;
            Some(GpuSummary {
                name: name.to_owned(),
                avg_usage: usage.avg,
                max_usage: usage.max,
                avg_memory: memory.avg,
                max_memory: memory.max,
            })
        });

        Some(Self {
            snapshots,
            span,
            cpu,
            ram,
            gpu,
        })
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}

/// Captures [`ResourceSnapshot`]s from a host source and an optional GPU.
pub struct ResourceSampler {
    host: Box<dyn HostMetrics>,
    gpu: GpuCapability,
    params: SampleParams,
}

impl ResourceSampler {
    pub fn new(host: Box<dyn HostMetrics>, gpu: GpuCapability, params: SampleParams) -> Self {
        Self { host, gpu, params }
    }

    /// `sysinfo` host readings plus platform GPU detection, attempted once.
    pub fn with_default_sources(params: SampleParams) -> Self {
        Self::new(
            Box::new(SysinfoHost::new()),
            GpuCapability::detect_default(),
            params,
        )
    }

    pub fn params(&self) -> &SampleParams {
        &self.params
    }

    pub fn gpu(&self) -> &GpuCapability {
        &self.gpu
    }

    /// Sample until `params.duration` has elapsed.
    ///
    /// GPU absence or a failing GPU read never fails the run.
    ///
    /// # Errors
    ///
    /// - [`BenchError::InvalidConfig`] for a zero duration or interval.
    /// - [`BenchError::Cancelled`] if `cancel` fires; snapshots are discarded.
    pub fn sample(&mut self, cancel: &CancellationToken) -> Result<ResourceResult> {
        self.params.validate()?;
        let SampleParams {
            duration,
            interval,
            cpu_window,
        } = self.params;
        info!(
            duration_ms = duration.as_millis() as u64,
            interval_ms = interval.as_millis() as u64,
            gpu = self.gpu.is_present(),
            "resource sampler started"
        );

        let start = Instant::now();
        let mut snapshots = Vec::new();
        while start.elapsed() < duration {
            if cancel.is_cancelled() {
                return Err(BenchError::Cancelled(Worker::Sampler));
            }

            let tick = Instant::now();
            let snapshot = self.capture(start, cpu_window);
            debug!(
                offset_ms = snapshot.offset.as_millis() as u64,
                cpu = snapshot.cpu_percent,
                ram = snapshot.ram_percent,
                gpu = snapshot.gpu.is_some(),
                "resource snapshot"
            );
            snapshots.push(snapshot);

            let left = duration.saturating_sub(start.elapsed());
            let wait = interval.saturating_sub(tick.elapsed()).min(left);
            if !sleep_unless_cancelled(wait, cancel) {
                return Err(BenchError::Cancelled(Worker::Sampler));
            }
        }
        let span = start.elapsed();

        let result = ResourceResult::from_snapshots(snapshots, span, self.gpu.device_name())
            .ok_or_else(|| {
                BenchError::InvalidConfig("resource sampler captured no snapshots".to_owned())
            })?;
        info!(
            snapshots = result.snapshot_count(),
            cpu_avg = result.cpu.avg,
            ram_avg = result.ram.avg,
            gpu = result.gpu.is_some(),
            "resource sampler finished"
        );
        Ok(result)
    }

    fn capture(&mut self, start: Instant, cpu_window: Duration) -> ResourceSnapshot {
        let offset = start.elapsed();
        let cpu_percent = self.host.cpu_percent(cpu_window);
        let ram_percent = self.host.ram_percent();
        let gpu = match &mut self.gpu {
            GpuCapability::Present(source) => match source.read() {
                Ok(reading) => Some(reading),
                Err(e) => {
                    debug!(error = %e, "GPU read failed, snapshot has no GPU reading");
                    None
                }
            },
            GpuCapability::Absent { .. } => None,
        };
        ResourceSnapshot {
            offset,
            cpu_percent,
            ram_percent,
            gpu,
        }
    }
}

/// Sleep for `total`, waking early if `cancel` fires.
///
/// Returns `false` if cancelled. Any `total` is accepted, including
/// `Duration::MAX`.
fn sleep_unless_cancelled(total: Duration, cancel: &CancellationToken) -> bool {
    let started = Instant::now();
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let slept = started.elapsed();
        if slept >= total {
            return true;
        }
        std::thread::sleep((total - slept).min(CANCEL_CHECK_INTERVAL));
    }
}
