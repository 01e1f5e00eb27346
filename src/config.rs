//! Configuration types for a benchmark run.
//!
//! [`BenchConfig`] is the file-backed surface (TOML, every field defaulted).
//! The core workers never see it directly: they take the plain
//! [`ProbeParams`] and [`SampleParams`] values derived from it.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Job queue connection.
    pub queue: QueueConfig,
    /// Latency prober workload.
    pub probe: ProbeConfig,
    /// Resource sampler cadence.
    pub sample: SampleConfig,
    /// Whole-run limits.
    pub run: RunConfig,
}

impl BenchConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| BenchError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| BenchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/genprobe/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("genprobe").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("genprobe")
                .join("config.toml")
        } else {
            PathBuf::from("genprobe.toml")
        }
    }

    /// Parameters for the latency prober.
    pub fn probe_params(&self) -> ProbeParams {
        ProbeParams {
            count: self.probe.count,
            width: self.probe.width,
            height: self.probe.height,
            steps: self.probe.steps,
            poll_interval: Duration::from_millis(self.probe.poll_interval_ms),
            job_timeout: Duration::from_secs(self.probe.job_timeout_secs),
            generation: self.probe.generation.clone(),
        }
    }

    /// Parameters for the resource sampler.
    pub fn sample_params(&self) -> SampleParams {
        SampleParams {
            duration: Duration::try_from_secs_f64(self.sample.duration_secs)
                .unwrap_or(Duration::ZERO),
            interval: Duration::from_millis(self.sample.interval_ms),
            cpu_window: Duration::from_millis(self.sample.cpu_window_ms),
        }
    }

    /// Overall run deadline.
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run.deadline_secs)
    }
}

/// Job queue connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Base URL of the ComfyUI-compatible server.
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8188".to_owned(),
            request_timeout_secs: 30,
        }
    }
}

/// Latency prober settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Number of jobs to submit.
    pub count: usize,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    /// Delay between status polls of a pending job.
    pub poll_interval_ms: u64,
    /// Ceiling on how long a single job may stay pending.
    pub job_timeout_secs: u64,
    /// Fixed knobs of the generated workflow.
    pub generation: GenerationSettings,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            count: 10,
            width: 512,
            height: 512,
            steps: 20,
            poll_interval_ms: 200,
            job_timeout_secs: 600,
            generation: GenerationSettings::default(),
        }
    }
}

/// Workflow settings that stay constant across every submitted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub checkpoint: String,
    pub cfg: f64,
    pub sampler_name: String,
    pub scheduler: String,
    pub negative_prompt: String,
    pub filename_prefix: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            checkpoint: "v1-5-pruned-emaonly.safetensors".to_owned(),
            cfg: 8.0,
            sampler_name: "euler".to_owned(),
            scheduler: "normal".to_owned(),
            negative_prompt: "bad".to_owned(),
            filename_prefix: "bench".to_owned(),
        }
    }
}

/// Resource sampler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Total wall-clock sampling time.
    pub duration_secs: f64,
    /// Cadence between snapshot starts.
    pub interval_ms: u64,
    /// Blocking window used to measure CPU utilisation. The sysinfo host
    /// source raises it to `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` (200 ms on
    /// Linux), and the window counts toward `interval_ms`.
    pub cpu_window_ms: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            duration_secs: 100.0,
            interval_ms: 500,
            cpu_window_ms: 100,
        }
    }
}

/// Whole-run limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Both workers are cancelled if the run is still going after this long.
    pub deadline_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 3_600,
        }
    }
}

/// Plain parameters for [`crate::prober::LatencyProber`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeParams {
    pub count: usize,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    pub generation: GenerationSettings,
}

impl Default for ProbeParams {
    fn default() -> Self {
        BenchConfig::default().probe_params()
    }
}

impl ProbeParams {
    /// Reject parameters that cannot produce a meaningful timing result.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(BenchError::InvalidConfig(
                "job count must be greater than zero".to_owned(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(BenchError::InvalidConfig(format!(
                "image dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.steps == 0 {
            return Err(BenchError::InvalidConfig(
                "step count must be greater than zero".to_owned(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(BenchError::InvalidConfig(
                "poll interval must be greater than zero".to_owned(),
            ));
        }
        if self.job_timeout.is_zero() {
            return Err(BenchError::InvalidConfig(
                "job timeout must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Plain parameters for [`crate::sampler::ResourceSampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleParams {
    pub duration: Duration,
    pub interval: Duration,
    pub cpu_window: Duration,
}

impl Default for SampleParams {
    fn default() -> Self {
        BenchConfig::default().sample_params()
    }
}

impl SampleParams {
    /// Reject parameters that cannot produce at least one snapshot.
    pub fn validate(&self) -> Result<()> {
        if self.duration.is_zero() {
            return Err(BenchError::InvalidConfig(
                "sample duration must be greater than zero".to_owned(),
            ));
        }
        if self.interval.is_zero() {
            return Err(BenchError::InvalidConfig(
                "sample interval must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}
