//! Rendering and persistence for [`RunReport`].

use crate::coordinator::RunReport;
use crate::error::{BenchError, Result};
use std::path::Path;

/// Placeholder for metrics that were not collected.
const NOT_AVAILABLE: &str = "n/a";

/// Render the human-readable summary.
///
/// GPU lines read `n/a` when no GPU data was collected, never zero.
pub fn render_text(report: &RunReport) -> String {
    let timing = &report.timing;
    let resources = &report.resources;

    let mut lines = vec![
        "=== TIMING ===".to_owned(),
        format!("Jobs:  {}", timing.count()),
        format!("Avg:   {:.2}s", timing.mean.as_secs_f64()),
        format!("Min:   {:.2}s", timing.min.as_secs_f64()),
        format!("Max:   {:.2}s", timing.max.as_secs_f64()),
        format!("Total: {:.2}s", timing.total.as_secs_f64()),
        String::new(),
        "=== RESOURCES ===".to_owned(),
        format!(
            "Samples: {} over {:.1}s",
            resources.snapshot_count(),
            resources.span.as_secs_f64()
        ),
        format!(
            "CPU avg: {:.1}%  max: {:.1}%",
            resources.cpu.avg, resources.cpu.max
        ),
        format!(
            "RAM avg: {:.1}%  max: {:.1}%",
            resources.ram.avg, resources.ram.max
        ),
    ];
    match &resources.gpu {
        Some(gpu) => lines.extend([
            format!("GPU:     {}", gpu.name),
            format!("GPU avg: {:.1}%  max: {:.1}%", gpu.avg_usage, gpu.max_usage),
            format!(
                "GPU mem avg: {:.1}%  max: {:.1}%",
                gpu.avg_memory, gpu.max_memory
            ),
        ]),
        None => lines.extend([
            format!("GPU:     {NOT_AVAILABLE}"),
            format!("GPU avg: {NOT_AVAILABLE}"),
            format!("GPU mem avg: {NOT_AVAILABLE}"),
        ]),
    }
    lines.push(String::new());
    lines.push(format!(
        "Run started {} and took {:.1}s",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.wall_time.as_secs_f64()
    ));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Write a report as pretty JSON, creating parent directories as needed.
pub fn write_json(report: &RunReport, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| BenchError::Config(format!("failed to serialize run report: {e}")))?;
    std::fs::write(output, json)?;
    Ok(())
}
