//! Runs the latency prober and resource sampler side by side and joins them.
//!
//! The prober runs as an async task and the sampler on the blocking pool, so
//! they make progress in parallel. Each hands its result back through its
//! `JoinHandle`; nothing else is shared except a cancellation token. When one
//! worker fails the other is cancelled and awaited before the failure is
//! returned, and an overall deadline cancels both. Dropping the `run` future
//! cancels both workers as well.

use crate::error::{BenchError, Result, Worker};
use crate::prober::{LatencyProber, TimingResult};
use crate::sampler::{ResourceResult, ResourceSampler};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Combined output of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    /// Time from spawning the workers until both had finished.
    pub wall_time: Duration,
    pub timing: TimingResult,
    pub resources: ResourceResult,
}

/// Owns both workers for a single run.
pub struct RunCoordinator {
    prober: LatencyProber,
    sampler: ResourceSampler,
    deadline: Duration,
    cancel: CancellationToken,
}

impl RunCoordinator {
    pub fn new(prober: LatencyProber, sampler: ResourceSampler, deadline: Duration) -> Self {
        Self {
            prober,
            sampler,
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that cancels the whole run (e.g. on Ctrl-C).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start both workers, wait for both, and merge their results.
    ///
    /// # Errors
    ///
    /// - [`BenchError::InvalidConfig`] if either parameter set is rejected;
    ///   nothing is started in that case.
    /// - [`BenchError::Worker`] naming the first worker that failed.
    /// - [`BenchError::Join`] if a worker task panicked.
    /// - [`BenchError::DeadlineExceeded`] if the run outlived its deadline.
    pub async fn run(self) -> Result<RunReport> {
        let Self {
            prober,
            mut sampler,
            deadline,
            cancel,
        } = self;
        prober.params().validate()?;
        sampler.params().validate()?;
        if deadline.is_zero() {
            return Err(BenchError::InvalidConfig(
                "run deadline must be greater than zero".to_owned(),
            ));
        }

        // Scoped to this call: dropping `run` early cancels both workers, and
        // cancelling the caller's token still reaches them.
        let run_cancel = cancel.child_token();
        let _stop_on_drop = run_cancel.clone().drop_guard();

        let started_at = Utc::now();
        let started = Instant::now();
        info!(
            jobs = prober.params().count,
            sample_secs = sampler.params().duration.as_secs_f64(),
            "run started"
        );

        let prober_cancel = run_cancel.child_token();
        let mut prober_task: JoinHandle<Result<TimingResult>> =
            tokio::spawn(async move { prober.probe(&prober_cancel).await });

        let sampler_cancel = run_cancel.child_token();
        let mut sampler_task: JoinHandle<Result<ResourceResult>> =
            tokio::task::spawn_blocking(move || sampler.sample(&sampler_cancel));

        let deadline_timer = tokio::time::sleep(deadline);
        tokio::pin!(deadline_timer);

        let mut timing: Option<Result<TimingResult>> = None;
        let mut resources: Option<Result<ResourceResult>> = None;
        let mut first_failure: Option<Worker> = None;
        let mut deadline_hit = false;

        while timing.is_none() || resources.is_none() {
            tokio::select! {
                res = &mut prober_task, if timing.is_none() => {
                    let outcome = flatten_join(Worker::Prober, res);
                    if outcome.is_err() && first_failure.is_none() {
                        first_failure = Some(Worker::Prober);
                        if resources.is_none() {
                            warn!("latency prober failed, cancelling resource sampler");
                        }
                        run_cancel.cancel();
                    }
                    timing = Some(outcome);
                }
                res = &mut sampler_task, if resources.is_none() => {
                    let outcome = flatten_join(Worker::Sampler, res);
                    if outcome.is_err() && first_failure.is_none() {
                        first_failure = Some(Worker::Sampler);
                        if timing.is_none() {
                            warn!("resource sampler failed, cancelling latency prober");
                        }
                        run_cancel.cancel();
                    }
                    resources = Some(outcome);
                }
                _ = &mut deadline_timer, if !deadline_hit && !run_cancel.is_cancelled() => {
                    warn!(
                        deadline_secs = deadline.as_secs_f64(),
                        "run deadline exceeded, cancelling workers"
                    );
                    deadline_hit = true;
                    run_cancel.cancel();
                }
            }
        }
        let wall_time = started.elapsed();

        let report = match (timing, resources) {
            (Some(Ok(timing)), Some(Ok(resources))) => RunReport {
                started_at,
                wall_time,
                timing,
                resources,
            },
            (timing, resources) => {
                return Err(select_failure(
                    deadline_hit.then_some(deadline),
                    first_failure,
                    timing.and_then(|r| r.err()),
                    resources.and_then(|r| r.err()),
                ));
            }
        };

        info!(
            wall_ms = wall_time.as_millis() as u64,
            jobs = report.timing.count(),
            snapshots = report.resources.snapshot_count(),
            "run finished"
        );
        Ok(report)
    }
}

/// Pick the error to surface for a failed run.
///
/// An expired deadline wins; otherwise the worker that failed first is
/// reported, not the one that was cancelled because of it.
fn select_failure(
    deadline: Option<Duration>,
    first_failure: Option<Worker>,
    prober_err: Option<BenchError>,
    sampler_err: Option<BenchError>,
) -> BenchError {
    if let Some(deadline) = deadline {
        return BenchError::DeadlineExceeded(deadline);
    }
    match (first_failure, prober_err, sampler_err) {
        (Some(Worker::Sampler), _, Some(e)) | (_, Some(e), _) | (_, None, Some(e)) => e,
        (_, None, None) => BenchError::Join {
            worker: first_failure.unwrap_or(Worker::Prober),
            message: "worker finished without a result".to_owned(),
        },
    }
}

/// Map a join outcome to a worker-attributed result.
fn flatten_join<T>(
    worker: Worker,
    res: std::result::Result<Result<T>, tokio::task::JoinError>,
) -> Result<T> {
    match res {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.in_worker(worker)),
        Err(join_err) => Err(BenchError::Join {
            worker,
            message: join_err.to_string(),
        }),
    }
}
