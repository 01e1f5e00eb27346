//! Latency prober: submit jobs one at a time and time each to completion.
//!
//! Each unit moves through `Submitted → Polling → {Completed, Failed,
//! TimedOut}`. Polling is bounded by the per-job timeout so a job that never
//! finishes fails the run with [`BenchError::JobTimeout`] instead of hanging.
//! Any failure aborts the loop and discards the samples gathered so far.

use crate::config::ProbeParams;
use crate::error::{BenchError, Result, Worker};
use crate::queue::{JobHandle, JobQueue, JobStatus};
use crate::workload::WorkUnit;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Elapsed time for one work unit, from just before submission to the poll
/// that observed completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    pub index: usize,
    pub job_id: String,
    pub prompt: String,
    pub seed: u64,
    pub elapsed: Duration,
}

/// Aggregate over all latency samples of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingResult {
    /// Samples in submission order.
    pub latencies: Vec<LatencySample>,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub total: Duration,
}

impl TimingResult {
    /// Summarise a non-empty sample sequence.
    ///
    /// Returns `None` for an empty sequence.
    pub fn from_samples(latencies: Vec<LatencySample>) -> Option<Self> {
        let count = u32::try_from(latencies.len()).ok().filter(|n| *n > 0)?;
        let total: Duration = latencies.iter().map(|s| s.elapsed).sum();
        let min = latencies.iter().map(|s| s.elapsed).min()?;
        let max = latencies.iter().map(|s| s.elapsed).max()?;
        Some(Self {
            mean: total / count,
            min,
            max,
            total,
            latencies,
        })
    }

    /// Number of timed units.
    pub fn count(&self) -> usize {
        self.latencies.len()
    }
}

/// Where a single job ended up.
#[derive(Debug, Clone, PartialEq)]
enum PollOutcome {
    Completed(Duration),
    Failed(String),
    TimedOut(Duration),
}

/// Drives work units through a [`JobQueue`] and times them.
pub struct LatencyProber {
    queue: Arc<dyn JobQueue>,
    params: ProbeParams,
}

impl LatencyProber {
    pub fn new(queue: Arc<dyn JobQueue>, params: ProbeParams) -> Self {
        Self { queue, params }
    }

    pub fn params(&self) -> &ProbeParams {
        &self.params
    }

    /// Submit `params.count` units sequentially and time each one.
    ///
    /// # Errors
    ///
    /// - [`BenchError::InvalidConfig`] if the parameters are rejected.
    /// - [`BenchError::QueueUnavailable`] / [`BenchError::SubmitRejected`]
    ///   if a queue call fails. No retries.
    /// - [`BenchError::JobTimeout`] / [`BenchError::JobFailed`] if a job does
    ///   not complete.
    /// - [`BenchError::Cancelled`] if `cancel` fires.
    pub async fn probe(&self, cancel: &CancellationToken) -> Result<TimingResult> {
        self.params.validate()?;
        let count = self.params.count;
        info!(count, "latency prober started");

        let mut latencies = Vec::with_capacity(count);
        for index in 0..count {
            let unit = WorkUnit::for_index(index, &self.params);
            let start = Instant::now();
            // Overflow means the timeout is beyond any reachable instant.
            let deadline = start.checked_add(self.params.job_timeout);
            let Some(submitted) =
                before(deadline, until_cancelled(cancel, self.queue.submit(&unit))).await
            else {
                // The queue never acknowledged the unit, so there is no job id yet.
                return Err(BenchError::JobTimeout {
                    job_id: format!("unit-{index}"),
                    waited: start.elapsed(),
                });
            };
            let handle = submitted?;

            match self.poll_until_done(&handle, start, deadline, cancel).await? {
                PollOutcome::Completed(elapsed) => {
                    info!(
                        index,
                        job_id = %handle,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "job completed"
                    );
                    latencies.push(LatencySample {
                        index,
                        job_id: handle.to_string(),
                        prompt: unit.prompt,
                        seed: unit.seed,
                        elapsed,
                    });
                }
                PollOutcome::Failed(reason) => {
                    return Err(BenchError::JobFailed {
                        job_id: handle.to_string(),
                        reason,
                    });
                }
                PollOutcome::TimedOut(waited) => {
                    return Err(BenchError::JobTimeout {
                        job_id: handle.to_string(),
                        waited,
                    });
                }
            }
        }

        let result = TimingResult::from_samples(latencies).ok_or_else(|| {
            BenchError::InvalidConfig("latency prober produced no samples".to_owned())
        })?;
        info!(
            count = result.count(),
            mean_ms = result.mean.as_millis() as u64,
            "latency prober finished"
        );
        Ok(result)
    }

    /// Poll `handle` until it leaves the pending state or the job deadline
    /// passes. The first poll happens immediately after submission, and a
    /// status call still in flight at the deadline is abandoned.
    async fn poll_until_done(
        &self,
        handle: &JobHandle,
        start: Instant,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome> {
        let mut polls: u32 = 0;
        loop {
            let Some(status) =
                before(deadline, until_cancelled(cancel, self.queue.status(handle))).await
            else {
                return Ok(PollOutcome::TimedOut(start.elapsed()));
            };
            polls = polls.saturating_add(1);
            match status? {
                JobStatus::Completed => return Ok(PollOutcome::Completed(start.elapsed())),
                JobStatus::Failed(reason) => return Ok(PollOutcome::Failed(reason)),
                JobStatus::Pending => {}
            }

            let now = Instant::now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => {
                    return Ok(PollOutcome::TimedOut(now.duration_since(start)));
                }
                Some(deadline) => self.params.poll_interval.min(deadline - now),
                None => self.params.poll_interval,
            };
            debug!(job_id = %handle, polls, "job pending");

            until_cancelled(cancel, async {
                tokio::time::sleep(wait).await;
                Ok(())
            })
            .await?;
        }
    }
}

/// Run `fut` to completion, or give up once `deadline` passes.
///
/// Returns `None` on expiry. Without a deadline `fut` always completes.
async fn before<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline.into(), fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Run `fut` unless `cancel` fires first.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BenchError::Cancelled(Worker::Prober)),
        res = fut => res,
    }
}
