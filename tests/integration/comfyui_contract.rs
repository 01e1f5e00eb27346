//! Contract tests for the ComfyUI queue client.
//!
//! Verify the exact HTTP shape of submissions and how history responses and
//! transport failures map onto `JobStatus` and `BenchError`.

use crate::helpers::{history_body, mount_submit, queue_config};
use genprobe::config::ProbeParams;
use genprobe::error::error_codes;
use genprobe::workload::WorkUnit;
use genprobe::{BenchError, ComfyUiClient, JobHandle, JobQueue, JobStatus};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn unit(index: usize) -> WorkUnit {
    let params = ProbeParams {
        width: 256,
        height: 384,
        steps: 4,
        ..ProbeParams::default()
    };
    WorkUnit::with_seed(index, &params, 42)
}

// ────────────────────────────────────────────────────────────────────────────
// Submission
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_posts_workflow_graph() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/prompt"))
        .and(body_partial_json(json!({
            "prompt": {
                "3": {"class_type": "KSampler", "inputs": {"seed": 42, "steps": 4}},
                "5": {"inputs": {"width": 256, "height": 384, "batch_size": 1}},
                "6": {"inputs": {"text": "a cat"}}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prompt_id": "abc-123"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ComfyUiClient::new(&queue_config(server.uri())).unwrap();
    let handle = client.submit(&unit(1)).await.unwrap();

    assert_eq!(handle.as_str(), "abc-123");
}

#[tokio::test]
async fn submit_sends_client_id() {
    let server = MockServer::start().await;
    mount_submit(&server, "p-1").await;

    let client = ComfyUiClient::new(&queue_config(server.uri())).unwrap();
    client.submit(&unit(0)).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let client_id = body["client_id"].as_str().expect("client_id string");
    assert!(uuid::Uuid::parse_str(client_id).is_ok(), "{client_id}");
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_ignored() {
    let server = MockServer::start().await;
    mount_submit(&server, "p-1").await;

    let client = ComfyUiClient::new(&queue_config(format!("{}/", server.uri()))).unwrap();

    assert!(!client.base_url().ends_with('/'));
    assert!(client.submit(&unit(0)).await.is_ok());
}

#[tokio::test]
async fn rejected_submission_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"type": "prompt_outputs_failed_validation"}
        })))
        .mount(&server)
        .await;

    let client = ComfyUiClient::new(&queue_config(server.uri())).unwrap();
    let err = client.submit(&unit(0)).await.unwrap_err();

    match &err {
        BenchError::SubmitRejected { status, message } => {
            assert_eq!(*status, 400);
            assert!(message.contains("prompt_outputs_failed_validation"));
        }
        other => panic!("expected SubmitRejected, got {other:?}"),
    }
    assert_eq!(err.code(), error_codes::SUBMIT_REJECTED);
}

#[tokio::test]
async fn malformed_submit_response_is_queue_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = ComfyUiClient::new(&queue_config(server.uri())).unwrap();
    let err = client.submit(&unit(0)).await.unwrap_err();

    assert!(matches!(err, BenchError::QueueUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_server_is_queue_unavailable() {
    // Grab a free port, then close it so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ComfyUiClient::new(&queue_config(format!("http://{addr}"))).unwrap();
    let err = client.submit(&unit(0)).await.unwrap_err();

    assert_eq!(err.code(), error_codes::QUEUE_UNAVAILABLE);
    assert!(err.to_string().contains("submit request"), "{err}");
}

// ────────────────────────────────────────────────────────────────────────────
// History polling
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_history_is_pending_then_completed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/history/p-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/history/p-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body("p-7", "success")))
        .mount(&server)
        .await;

    let client = ComfyUiClient::new(&queue_config(server.uri())).unwrap();
    let handle = JobHandle::new("p-7");

    assert_eq!(client.status(&handle).await.unwrap(), JobStatus::Pending);
    assert_eq!(client.status(&handle).await.unwrap(), JobStatus::Pending);
    assert_eq!(client.status(&handle).await.unwrap(), JobStatus::Completed);
}

#[tokio::test]
async fn error_status_reports_failed_job() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/history/p-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "p-9": {
                "status": {
                    "status_str": "error",
                    "completed": false,
                    "messages": [
                        ["execution_start", {"prompt_id": "p-9"}],
                        ["execution_error", {
                            "node_type": "CheckpointLoaderSimple",
                            "exception_message": "model not found\n"
                        }]
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let client = ComfyUiClient::new(&queue_config(server.uri())).unwrap();
    let status = client.status(&JobHandle::new("p-9")).await.unwrap();

    assert_eq!(
        status,
        JobStatus::Failed("CheckpointLoaderSimple: model not found".to_owned())
    );
}

#[tokio::test]
async fn history_server_error_is_queue_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/history/p-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = ComfyUiClient::new(&queue_config(server.uri())).unwrap();
    let err = client.status(&JobHandle::new("p-1")).await.unwrap_err();

    assert!(matches!(err, BenchError::QueueUnavailable(_)));
    assert!(err.to_string().contains("HTTP 500"), "{err}");
}
