//! HTTP client for a ComfyUI-compatible prompt queue.
//!
//! - `POST {base}/prompt` with `{"prompt": <graph>, "client_id": <uuid>}`
//!   returns `{"prompt_id": "..."}`.
//! - `GET {base}/history/{id}` returns `{}` while the job is pending and
//!   `{"<id>": {"status": {"status_str": ..., "completed": ...}}}` once it
//!   has finished.

use super::{JobHandle, JobQueue, JobStatus};
use crate::config::QueueConfig;
use crate::error::{BenchError, Result};
use crate::workload::WorkUnit;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// Maximum number of response-body characters carried into error messages.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    prompt_id: String,
}

/// Job queue client speaking the ComfyUI HTTP API.
pub struct ComfyUiClient {
    base_url: String,
    client_id: String,
    client: reqwest::Client,
}

impl ComfyUiClient {
    /// Create a client for the configured server.
    pub fn new(config: &QueueConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BenchError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            client_id: uuid::Uuid::new_v4().to_string(),
            client,
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl JobQueue for ComfyUiClient {
    async fn submit(&self, unit: &WorkUnit) -> Result<JobHandle> {
        let url = format!("{}/prompt", self.base_url);
        let body = json!({
            "prompt": build_workflow(unit),
            "client_id": self.client_id,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("submit", &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BenchError::SubmitRejected {
                status: status.as_u16(),
                message: truncate(&text),
            });
        }

        let parsed: SubmitResponse = resp.json().await.map_err(|e| {
            BenchError::QueueUnavailable(format!("unexpected submit response: {e}"))
        })?;
        debug!(index = unit.index, prompt_id = %parsed.prompt_id, "job submitted");
        Ok(JobHandle::new(parsed.prompt_id))
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus> {
        let url = format!("{}/history/{}", self.base_url, handle);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error("history", &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BenchError::QueueUnavailable(format!(
                "history query returned HTTP {}: {}",
                status.as_u16(),
                truncate(&text)
            )));
        }

        let history: Value = resp.json().await.map_err(|e| {
            BenchError::QueueUnavailable(format!("unexpected history response: {e}"))
        })?;
        Ok(parse_history_entry(&history, handle.as_str()))
    }
}

/// Interpret a `/history/{id}` body for the given job id.
pub fn parse_history_entry(history: &Value, job_id: &str) -> JobStatus {
    let Some(entry) = history.get(job_id) else {
        return JobStatus::Pending;
    };
    let Some(status) = entry.get("status") else {
        // Older servers only add the entry once outputs are written.
        return JobStatus::Completed;
    };
    match status.get("status_str").and_then(Value::as_str) {
        Some("error") => JobStatus::Failed(execution_error_message(status)),
        _ => JobStatus::Completed,
    }
}

fn execution_error_message(status: &Value) -> String {
    status
        .get("messages")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find_map(|msg| {
            let pair = msg.as_array()?;
            if pair.first()?.as_str()? != "execution_error" {
                return None;
            }
            let detail = pair.get(1)?;
            let message = detail.get("exception_message")?.as_str()?.trim();
            match detail.get("node_type").and_then(Value::as_str) {
                Some(node) => Some(format!("{node}: {message}")),
                None => Some(message.to_owned()),
            }
        })
        .unwrap_or_else(|| "execution error".to_owned())
}

/// Build the text-to-image workflow graph for one unit.
///
/// Node ids are fixed: `4` checkpoint loader, `5` empty latent, `6`/`7`
/// positive/negative text encoders, `3` sampler, `8` VAE decode, `9` save.
pub fn build_workflow(unit: &WorkUnit) -> Value {
    let generation = &unit.generation;
    json!({
        "3": {
            "class_type": "KSampler",
            "inputs": {
                "seed": unit.seed,
                "steps": unit.steps,
                "cfg": generation.cfg,
                "sampler_name": generation.sampler_name,
                "scheduler": generation.scheduler,
                "denoise": 1.0,
                "model": ["4", 0],
                "positive": ["6", 0],
                "negative": ["7", 0],
                "latent_image": ["5", 0],
            },
        },
        "4": {
            "class_type": "CheckpointLoaderSimple",
            "inputs": { "ckpt_name": generation.checkpoint },
        },
        "5": {
            "class_type": "EmptyLatentImage",
            "inputs": { "width": unit.width, "height": unit.height, "batch_size": 1 },
        },
        "6": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": unit.prompt, "clip": ["4", 1] },
        },
        "7": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": generation.negative_prompt, "clip": ["4", 1] },
        },
        "8": {
            "class_type": "VAEDecode",
            "inputs": { "samples": ["3", 0], "vae": ["4", 2] },
        },
        "9": {
            "class_type": "SaveImage",
            "inputs": { "filename_prefix": generation.filename_prefix, "images": ["8", 0] },
        },
    })
}

fn transport_error(call: &str, err: &reqwest::Error) -> BenchError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "transport error"
    };
    BenchError::QueueUnavailable(format!("{call} request {kind}: {err}"))
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
