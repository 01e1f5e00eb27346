//! In-process fakes shared by the unit test modules.

use crate::error::{BenchError, Result};
use crate::metrics::{GpuReading, GpuSource, HostMetrics};
use crate::queue::{JobHandle, JobQueue, JobStatus};
use crate::workload::WorkUnit;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Job queue that hands out `job-{n}` ids and completes each job after a
/// configurable number of pending polls.
#[derive(Default)]
pub struct FakeQueue {
    submit_latency: Duration,
    status_latency: Duration,
    pending_polls: u32,
    fail_submit_at: Option<usize>,
    failing_job: Option<(usize, String)>,
    submissions: AtomicUsize,
    status_calls: AtomicU32,
    polls_seen: Mutex<HashMap<String, u32>>,
}

impl FakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every submit call by `latency`.
    pub fn with_submit_latency(mut self, latency: Duration) -> Self {
        self.submit_latency = latency;
        self
    }

    /// Delay every status call by `latency`.
    pub fn with_status_latency(mut self, latency: Duration) -> Self {
        self.status_latency = latency;
        self
    }

    /// Answer `Pending` this many times per job before `Completed`.
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Make the submit call for unit `index` fail as if the server were down.
    pub fn failing_submit_at(mut self, index: usize) -> Self {
        self.fail_submit_at = Some(index);
        self
    }

    /// Report job number `index` as failed with `reason`.
    pub fn failing_job_at(mut self, index: usize, reason: &str) -> Self {
        self.failing_job = Some((index, reason.to_owned()));
        self
    }

    /// Number of submit calls received, including failed ones.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobQueue for FakeQueue {
    async fn submit(&self, _unit: &WorkUnit) -> Result<JobHandle> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst);
        if !self.submit_latency.is_zero() {
            tokio::time::sleep(self.submit_latency).await;
        }
        if self.fail_submit_at == Some(n) {
            return Err(BenchError::QueueUnavailable(
                "submit request connection failed: connection refused".to_owned(),
            ));
        }
        Ok(JobHandle::new(format!("job-{n}")))
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if !self.status_latency.is_zero() {
            tokio::time::sleep(self.status_latency).await;
        }
        if let Some((index, reason)) = &self.failing_job
            && handle.as_str() == format!("job-{index}")
        {
            return Ok(JobStatus::Failed(reason.clone()));
        }

        let seen = {
            let mut polls = self
                .polls_seen
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let seen = polls.entry(handle.to_string()).or_insert(0);
            let before = *seen;
            *seen = seen.saturating_add(1);
            before
        };
        if seen < self.pending_polls {
            Ok(JobStatus::Pending)
        } else {
            Ok(JobStatus::Completed)
        }
    }
}

/// Host metrics returning fixed values.
pub struct ConstantHost {
    cpu: f64,
    ram: f64,
    block_for_window: bool,
}

impl ConstantHost {
    pub fn new(cpu: f64, ram: f64) -> Self {
        Self {
            cpu,
            ram,
            block_for_window: false,
        }
    }

    /// Sleep for the CPU window like a real source does.
    pub fn with_blocking_cpu(mut self) -> Self {
        self.block_for_window = true;
        self
    }
}

impl HostMetrics for ConstantHost {
    fn cpu_percent(&mut self, window: Duration) -> f64 {
        if self.block_for_window {
            std::thread::sleep(window);
        }
        self.cpu
    }

    fn ram_percent(&mut self) -> f64 {
        self.ram
    }
}

/// GPU source replaying a scripted list of readings.
///
/// `None` entries fail the read. The last entry repeats once the list is
/// exhausted.
pub struct FakeGpu {
    script: Vec<Option<GpuReading>>,
    next: usize,
}

impl FakeGpu {
    pub fn constant(utilization: f64, memory: f64) -> Self {
        Self::sequence([Some((utilization, memory))])
    }

    pub fn sequence(script: impl IntoIterator<Item = Option<(f64, f64)>>) -> Self {
        let script = script
            .into_iter()
            .map(|entry| {
                entry.map(|(utilization, memory)| GpuReading {
                    utilization_percent: utilization,
                    memory_used_percent: memory,
                })
            })
            .collect();
        Self { script, next: 0 }
    }
}

impl GpuSource for FakeGpu {
    fn name(&self) -> &str {
        "Fake GPU"
    }

    fn read(&mut self) -> Result<GpuReading> {
        let idx = self.next.min(self.script.len().saturating_sub(1));
        self.next = self.next.saturating_add(1);
        self.script
            .get(idx)
            .copied()
            .flatten()
            .ok_or_else(|| BenchError::MetricsSourceUnavailable("scripted read failure".into()))
    }
}
