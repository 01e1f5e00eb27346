//! Full coordinator runs against a mock ComfyUI server.

use crate::helpers::{FixedHost, history_body, mount_submit, queue_config};
use genprobe::config::{ProbeParams, SampleParams};
use genprobe::report::render_text;
use genprobe::{
    BenchError, ComfyUiClient, GpuCapability, LatencyProber, ResourceSampler, RunCoordinator,
    Worker,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn probe_params(count: usize) -> ProbeParams {
    ProbeParams {
        count,
        poll_interval: Duration::from_millis(20),
        job_timeout: Duration::from_secs(5),
        ..ProbeParams::default()
    }
}

fn fixed_sampler(duration: Duration) -> ResourceSampler {
    ResourceSampler::new(
        Box::new(FixedHost {
            cpu: 35.0,
            ram: 60.0,
        }),
        GpuCapability::absent("no GPU in test"),
        SampleParams {
            duration,
            interval: Duration::from_millis(50),
            cpu_window: Duration::from_millis(5),
        },
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_reports_timing_and_resources() {
    let server = MockServer::start().await;
    mount_submit(&server, "p-1").await;
    Mock::given(method("GET"))
        .and(path("/history/p-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(history_body("p-1", "success"))
                .set_delay(Duration::from_millis(30)),
        )
        .mount(&server)
        .await;

    let client = ComfyUiClient::new(&queue_config(server.uri())).unwrap();
    let coordinator = RunCoordinator::new(
        LatencyProber::new(Arc::new(client), probe_params(2)),
        fixed_sampler(Duration::from_millis(300)),
        Duration::from_secs(30),
    );

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.timing.count(), 2);
    assert!(report.timing.min >= Duration::from_millis(30));
    let summed: Duration = report.timing.latencies.iter().map(|s| s.elapsed).sum();
    assert_eq!(report.timing.total, summed);
    assert_eq!(report.resources.cpu.avg, 35.0);
    assert_eq!(report.resources.ram.max, 60.0);
    assert!(report.resources.gpu.is_none());

    let text = render_text(&report);
    assert!(text.contains("Jobs:  2"), "{text}");
    assert!(text.contains("GPU avg: n/a"), "{text}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_submission_stops_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid prompt"})),
        )
        .mount(&server)
        .await;

    let client = ComfyUiClient::new(&queue_config(server.uri())).unwrap();
    let coordinator = RunCoordinator::new(
        LatencyProber::new(Arc::new(client), probe_params(3)),
        fixed_sampler(Duration::from_secs(30)),
        Duration::from_secs(60),
    );

    let started = std::time::Instant::now();
    let err = coordinator.run().await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(err.worker(), Some(Worker::Prober));
    assert!(matches!(
        err.root(),
        BenchError::SubmitRejected { status: 400, .. }
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
