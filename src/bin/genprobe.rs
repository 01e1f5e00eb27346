//! CLI binary for genprobe.

use clap::Parser;
use genprobe::report::{render_text, write_json};
use genprobe::{BenchConfig, ComfyUiClient, LatencyProber, ResourceSampler, RunCoordinator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Measure job-queue latency while sampling host resource usage.
#[derive(Parser)]
#[command(name = "genprobe", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of generation jobs to submit.
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Image width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Image height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Sampling steps per job.
    #[arg(long)]
    steps: Option<u32>,

    /// Resource sampling duration in seconds.
    #[arg(short, long)]
    duration: Option<f64>,

    /// Base URL of the job queue server.
    #[arg(long)]
    url: Option<String>,

    /// Also write the report as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut BenchConfig) {
        if let Some(count) = self.count {
            config.probe.count = count;
        }
        if let Some(width) = self.width {
            config.probe.width = width;
        }
        if let Some(height) = self.height {
            config.probe.height = height;
        }
        if let Some(steps) = self.steps {
            config.probe.steps = steps;
        }
        if let Some(duration) = self.duration {
            config.sample.duration_secs = duration;
        }
        if let Some(url) = &self.url {
            config.queue.base_url.clone_from(url);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("genprobe=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = if let Some(ref path) = cli.config {
        BenchConfig::from_file(path)?
    } else {
        BenchConfig::default()
    };
    cli.apply_overrides(&mut config);

    let client = ComfyUiClient::new(&config.queue)?;
    info!(url = client.base_url(), "using job queue");

    let prober = LatencyProber::new(Arc::new(client), config.probe_params());
    let sample_params = config.sample_params();
    // GPU detection can block on driver init; keep it off the async workers.
    let sampler =
        tokio::task::spawn_blocking(move || ResourceSampler::with_default_sources(sample_params))
            .await?;
    let coordinator = RunCoordinator::new(prober, sampler, config.run_deadline());

    let cancel = coordinator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel.cancel();
        }
    });

    let report = coordinator.run().await?;

    print!("{}", render_text(&report));
    if let Some(path) = cli.json {
        write_json(&report, &path)?;
        info!(path = %path.display(), "wrote JSON report");
    }

    Ok(())
}
