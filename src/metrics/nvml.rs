//! NVIDIA GPU readings via NVML.

use super::{GpuReading, GpuSource, used_percent};
use crate::error::{BenchError, Result};
use nvml_wrapper::Nvml;

/// An NVML handle plus the index of the device it reads.
///
/// `nvml_wrapper::Device` borrows the library handle, so the device is looked
/// up by index on every read instead of being stored.
pub struct NvmlGpu {
    nvml: Nvml,
    index: u32,
    name: String,
}

impl NvmlGpu {
    /// Initialise NVML and open device `index`.
    pub fn open(index: u32) -> Result<Self> {
        let nvml = Nvml::init().map_err(|e| {
            BenchError::MetricsSourceUnavailable(format!("NVML init failed: {e}"))
        })?;
        let name = nvml
            .device_by_index(index)
            .and_then(|device| device.name())
            .map_err(|e| {
                BenchError::MetricsSourceUnavailable(format!("GPU {index} unavailable: {e}"))
            })?;
        Ok(Self { nvml, index, name })
    }
}

impl GpuSource for NvmlGpu {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> Result<GpuReading> {
        let unavailable =
            |e: nvml_wrapper::error::NvmlError| BenchError::MetricsSourceUnavailable(e.to_string());
        let device = self.nvml.device_by_index(self.index).map_err(unavailable)?;
        let utilization = device.utilization_rates().map_err(unavailable)?;
        let memory = device.memory_info().map_err(unavailable)?;
        Ok(GpuReading {
            utilization_percent: f64::from(utilization.gpu),
            memory_used_percent: used_percent(memory.used, memory.total),
        })
    }
}
